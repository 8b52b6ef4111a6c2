use regex::Regex;
use std::collections::BTreeSet;

/// Common English function words never indexed as keywords.
pub const STOP_WORDS: &[&str] = &[
	"the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
	"is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did",
	"will", "would", "could", "should", "may", "might", "can", "this", "that", "these", "those",
	"i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my", "your",
	"his", "its", "our", "their",
];

const MIN_KEYWORD_CHARS: usize = 3;
const MIN_SENTENCE_CHARS: usize = 11;
const MIN_PHRASE_CHARS: usize = 11;
const MIN_PHRASE_WORDS: usize = 2;
const MAX_PHRASE_WORDS: usize = 4;

/// Text normalization plus keyword and phrase extraction. Build once and reuse;
/// construction compiles the regexes.
pub struct Normalizer {
	whitespace: Regex,
	disallowed: Regex,
	non_word: Regex,
	sentence_end: Regex,
	stop_words: BTreeSet<&'static str>,
}

impl Default for Normalizer {
	fn default() -> Self { Self::new() }
}

impl Normalizer {
	pub fn new() -> Self {
		Self {
			whitespace: Regex::new(r"\s+").expect("whitespace regex should compile"),
			disallowed: Regex::new(r"[^\w\s\.\,\!\?\-\(\)]").expect("punctuation regex should compile"),
			non_word: Regex::new(r"[^\w]").expect("non-word regex should compile"),
			sentence_end: Regex::new(r"[.!?]+").expect("sentence regex should compile"),
			stop_words: STOP_WORDS.iter().copied().collect(),
		}
	}

	/// Collapse whitespace runs, replace characters outside word chars,
	/// whitespace and `. , ! ? - ( )` with a space, then trim.
	pub fn clean_text(&self, text: &str) -> String {
		let collapsed = self.whitespace.replace_all(text, " ");
		let stripped = self.disallowed.replace_all(&collapsed, " ");
		stripped.trim().to_string()
	}

	pub fn keywords(&self, cleaned: &str) -> BTreeSet<String> {
		cleaned
			.to_lowercase()
			.split_whitespace()
			.map(|w| self.non_word.replace_all(w, "").into_owned())
			.filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS && !self.stop_words.contains(w.as_str()))
			.collect()
	}

	/// Contiguous 2..=4 word spans of every sentence longer than 10 chars,
	/// keeping spans longer than 10 chars.
	pub fn phrases(&self, cleaned: &str) -> BTreeSet<String> {
		let mut phrases = BTreeSet::new();
		for sentence in self.sentence_end.split(cleaned) {
			let sentence = sentence.trim().to_lowercase();
			if sentence.chars().count() < MIN_SENTENCE_CHARS {
				continue;
			}
			let words: Vec<&str> = sentence.split_whitespace().collect();
			for i in 0..words.len() {
				let longest = MAX_PHRASE_WORDS.min(words.len() - i);
				for len in MIN_PHRASE_WORDS..=longest {
					let phrase = words[i..i + len].join(" ");
					if phrase.chars().count() >= MIN_PHRASE_CHARS {
						phrases.insert(phrase);
					}
				}
			}
		}
		phrases
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clean_text_collapses_whitespace_and_strips_symbols() {
		let n = Normalizer::new();
		assert_eq!(n.clean_text("  Hotel\t\tbooking:\n#42 (draft)! "), "Hotel booking   42 (draft)!");
		assert_eq!(n.clean_text("Заказ №5"), "Заказ  5");
	}

	#[test]
	fn keywords_skip_stop_words_and_short_tokens() {
		let n = Normalizer::new();
		let kw = n.keywords("The hotel, and the BOOKING is ok test");
		let got: Vec<&str> = kw.iter().map(|s| s.as_str()).collect();
		assert_eq!(got, vec!["booking", "hotel", "test"]);
	}

	#[test]
	fn phrases_span_two_to_four_words() {
		let n = Normalizer::new();
		let phrases = n.phrases("Hotel booking confirmation arrives quickly. Short one.");
		assert!(phrases.contains("hotel booking"));
		assert!(phrases.contains("hotel booking confirmation"));
		assert!(phrases.contains("hotel booking confirmation arrives"));
		assert!(!phrases.contains("hotel booking confirmation arrives quickly"));
		// "short one" sentence is too short to produce phrases
		assert!(phrases.iter().all(|p| !p.contains("short")));
		// rendered length must exceed 10 chars
		assert!(phrases.iter().all(|p| p.chars().count() > 10));
	}

	#[test]
	fn phrases_of_short_text_are_empty() {
		let n = Normalizer::new();
		assert!(n.phrases("hi there").is_empty());
		assert!(n.phrases("").is_empty());
	}
}
