//! Delimiter-sniffing CSV reader for platform exports.
//!
//! Exports arrive comma, semicolon or tab separated, sometimes gzipped,
//! sometimes with a UTF-8 BOM and quoted cells holding embedded delimiters
//! or newlines. Plain files are memory mapped; `.gz` files stream through a
//! gzip decoder.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::MultiGzDecoder;
use memmap2::Mmap;

use crate::input::{InputError, RawTable};

pub fn read_table(path: &Path) -> Result<RawTable, InputError> {
    let text = read_to_text(path)?;
    parse_csv(&text)
}

fn read_to_text(path: &Path) -> Result<String, InputError> {
    if path.extension().is_some_and(|ext| ext == "gz") {
        let file = File::open(path)?;
        let mut decoder = MultiGzDecoder::new(file);
        let mut text = String::new();
        decoder.read_to_string(&mut text).map_err(|e| {
            InputError::InvalidInput(format!("failed to inflate {}: {e}", path.display()))
        })?;
        return Ok(text);
    }
    let file = File::open(path)?;
    // The map stays read-only and is copied out before this function returns.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(String::from_utf8_lossy(&mmap).into_owned())
}

pub fn parse_csv(text: &str) -> Result<RawTable, InputError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let records = split_records(text);
    let mut records = records
        .into_iter()
        .filter(|r| !r.trim().is_empty());

    let header_record = records
        .next()
        .ok_or_else(|| InputError::InvalidInput("input has no header row".to_string()))?;
    let delimiter = detect_delimiter(header_record);
    let headers: Vec<String> = split_fields(header_record, delimiter)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(InputError::InvalidInput(
            "header row has no column labels".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for record in records {
        let mut fields = split_fields(record, delimiter);
        // Ragged rows happen in hand-edited exports. Pad short ones, drop
        // trailing overflow cells.
        if fields.len() < headers.len() {
            fields.resize(headers.len(), String::new());
        } else {
            fields.truncate(headers.len());
        }
        rows.push(fields);
    }

    Ok(RawTable { headers, rows })
}

/// Record boundaries are newlines outside quoted cells.
fn split_records(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut start = 0usize;
    let mut in_quotes = false;
    for (idx, ch) in text.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => {
                records.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < text.len() {
        records.push(&text[start..]);
    }
    records
}

fn detect_delimiter(header_record: &str) -> char {
    let mut best = ',';
    let mut best_count = 0usize;
    for candidate in [',', ';', '\t'] {
        let count = count_outside_quotes(header_record, candidate);
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

fn count_outside_quotes(record: &str, target: char) -> usize {
    let mut count = 0usize;
    let mut in_quotes = false;
    for ch in record.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == target && !in_quotes {
            count += 1;
        }
    }
    count
}

fn split_fields(record: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = record.chars().peekable();
    let mut in_quotes = false;
    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == delimiter {
            fields.push(std::mem::take(&mut field));
        } else if ch != '\r' {
            field.push(ch);
        }
    }
    fields.push(field);
    fields
}
