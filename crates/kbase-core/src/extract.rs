//! Plain-text extraction for the binary and tabular formats of the knowledge
//! tree: Word documents and ticket exports (CSV or JSON lines).

use anyhow::{anyhow, bail, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::io::{Cursor, Read};

const DOCX_BODY: &str = "word/document.xml";
const TICKET_COLUMNS: [&str; 3] = ["Subject", "Description", "Last notes"];

/// Paragraph text of a `.docx`, one paragraph per line, empty paragraphs dropped.
pub fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("not a zip archive")?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .with_context(|| format!("missing {}", DOCX_BODY))?
        .read_to_string(&mut xml)
        .with_context(|| format!("reading {}", DOCX_BODY))?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event().map_err(|e| anyhow!("malformed {}: {}", DOCX_BODY, e))? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| anyhow!("bad text in {}: {}", DOCX_BODY, e))?;
                current.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs.join("\n"))
}

/// One line per ticket row: `Subject Description Last notes`, blanks skipped.
pub fn csv_tickets(bytes: &[u8], file_id: &str) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = reader.headers().context("reading csv header")?.clone();
    let columns: Vec<usize> = TICKET_COLUMNS
        .iter()
        .filter_map(|name| headers.iter().position(|h| h.trim() == *name))
        .collect();
    if columns.is_empty() {
        bail!("no {} columns in csv header", TICKET_COLUMNS.join("/"));
    }

    let mut lines = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(file = file_id, row = row + 1, error = %e, "skipping malformed ticket row");
                continue;
            }
        };
        let fields = columns.iter().map(|&i| record.get(i).unwrap_or_default().to_string());
        if let Some(line) = join_ticket_fields(fields) {
            lines.push(line);
        }
    }
    Ok(lines.join("\n"))
}

#[derive(Debug, Deserialize)]
struct TicketRecord {
    #[serde(rename = "Subject", default)]
    subject: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Last notes", default)]
    last_notes: Option<String>,
}

/// JSON-lines ticket export, flattened like [`csv_tickets`].
pub fn jsonl_tickets(raw: &str, file_id: &str) -> String {
    let mut lines = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: TicketRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(file = file_id, line = lineno + 1, error = %e, "skipping malformed ticket line");
                continue;
            }
        };
        let fields = [record.subject, record.description, record.last_notes].into_iter().flatten();
        if let Some(line) = join_ticket_fields(fields) {
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn join_ticket_fields(fields: impl Iterator<Item = String>) -> Option<String> {
    let joined = fields
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}
