//! kbase-text
//!
//! Keyword/phrase/category inverted indices over chunks and the additive
//! lexical scorer that answers queries without an embedding model.

pub mod index;
pub mod normalize;
pub mod search;

pub use index::{LexicalIndex, LexicalIndexer};
pub use normalize::Normalizer;
pub use search::LexicalSearchEngine;
