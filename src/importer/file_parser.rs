// ==========================================
// Trip import engine - CSV parser
// ==========================================
// Stage 0: raw content -> header + logical data rows
// Every logical row after the header is emitted, blank ones included, so the
// completeness accountant sees the same row count the file physically has.
// A quoted field spanning several physical lines is one logical row.
// ==========================================

use crate::importer::error::{ImportError, ImportOutcome};
use crate::importer::trip_importer_trait::FileParser;
use csv::ReaderBuilder;
use std::fs;
use std::path::Path;

const UTF8_BOM: char = '\u{feff}';

// ==========================================
// RawRow / ParsedCsv
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub row_number: usize,           // 1-based, first data row = 1
    pub values: Vec<String>,         // trimmed cell values, positional
    pub parse_error: Option<String>, // set when the line itself could not be tokenized
}

impl RawRow {
    pub fn is_blank(&self) -> bool {
        self.parse_error.is_none() && self.values.iter().all(|v| v.is_empty())
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).map(String::as_str).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl ParsedCsv {
    /// Number of data rows after the header
    pub fn expected_rows(&self) -> usize {
        self.rows.len()
    }
}

// ==========================================
// Logical line splitting
// ==========================================
// A quote opens a quoted field only at the start of a field, as in RFC 4180.
// A `"` inside an unquoted field is a literal character.
// A record may span physical lines only through a quoted field that closes
// cleanly (closing quote followed by a delimiter or the end of a line).
// A quote that never closes, or closes into stray text after swallowing
// line breaks, does not absorb the lines after it: the opening line becomes
// a broken row and scanning resumes on the next physical line.

/// One logical record of the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine<'a> {
    pub text: &'a str,
    pub first_line: usize, // 1-based physical line (header = 1)
    pub broken_quote: bool, // opening line of an unclosed multi-line quote
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted, // saw `"` inside a quoted field: closing quote or first half of `""`
}

/// Advance the quote state over one physical line.
///
/// # Returns
/// - (state at end of line, whether a closing quote was followed by stray text)
fn scan_quotes(mut state: QuoteState, text: &str) -> (QuoteState, bool) {
    let mut stray = false;
    for ch in text.chars() {
        state = match (state, ch) {
            (QuoteState::Quoted, '"') => QuoteState::QuoteInQuoted,
            (QuoteState::Quoted, _) => QuoteState::Quoted,
            (QuoteState::QuoteInQuoted, '"') => QuoteState::Quoted,
            (_, ',') => QuoteState::FieldStart,
            (QuoteState::FieldStart, '"') => QuoteState::Quoted,
            (QuoteState::QuoteInQuoted, _) => {
                stray = true;
                QuoteState::Unquoted
            }
            _ => QuoteState::Unquoted,
        };
    }
    (state, stray)
}

/// Byte ranges of the physical lines, terminators excluded.
///
/// `\r\n` and `\n` are both terminators. A terminator at the very end of the
/// content does not open a new line.
fn physical_lines(content: &str) -> Vec<(usize, usize)> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (idx, _) in content.match_indices('\n') {
        let end = if content[start..idx].ends_with('\r') { idx - 1 } else { idx };
        lines.push((start, end));
        start = idx + 1;
    }

    if start < content.len() {
        let end = if content.ends_with('\r') {
            content.len() - 1
        } else {
            content.len()
        };
        lines.push((start, end));
    }

    lines
}

/// Split content into logical records; every physical line belongs to exactly one
pub fn split_logical_lines(content: &str) -> Vec<LogicalLine<'_>> {
    let lines = physical_lines(content);
    let mut logical = Vec::new();
    let mut first = 0;

    while first < lines.len() {
        let (start, end) = lines[first];
        let (mut state, _) = scan_quotes(QuoteState::FieldStart, &content[start..end]);
        let mut last = first;
        let mut stray = false;

        while state == QuoteState::Quoted && last + 1 < lines.len() {
            last += 1;
            let (s, e) = lines[last];
            let (next, stray_here) = scan_quotes(state, &content[s..e]);
            state = next;
            if stray_here {
                stray = true;
                break;
            }
        }

        if state == QuoteState::Quoted || stray {
            logical.push(LogicalLine {
                text: &content[start..end],
                first_line: first + 1,
                broken_quote: true,
            });
            first += 1;
        } else {
            logical.push(LogicalLine {
                text: &content[start..lines[last].1],
                first_line: first + 1,
                broken_quote: false,
            });
            first = last + 1;
        }
    }

    logical
}

/// Tokenize one logical record; a line the reader splits into several records is an error
fn tokenize_line(line: &str) -> ImportOutcome<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut records = reader.records();

    let values = match records.next() {
        Some(record) => record?.iter().map(|v| v.trim().to_string()).collect(),
        None => Vec::new(),
    };
    if records.next().is_some() {
        return Err(ImportError::CsvParseError(
            "line holds more than one CSV record".to_string(),
        ));
    }
    Ok(values)
}

// ==========================================
// CsvParser
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// Read a CSV file from disk as raw bytes
    pub fn read_file(&self, file_path: &Path) -> ImportOutcome<Vec<u8>> {
        if !file_path.exists() {
            return Err(ImportError::FileReadError(format!(
                "file not found: {}",
                file_path.display()
            )));
        }

        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::FileReadError(format!(
                    "unsupported file extension: {}",
                    ext.to_string_lossy()
                )));
            }
        }

        Ok(fs::read(file_path)?)
    }
}

impl FileParser for CsvParser {
    fn parse_str(&self, content: &str) -> ImportOutcome<ParsedCsv> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
        let mut lines = split_logical_lines(content).into_iter();

        let header_line = lines.next().ok_or(ImportError::MissingHeader)?;
        if header_line.broken_quote {
            return Err(ImportError::CsvParseError(
                "header row has an unclosed quoted field".to_string(),
            ));
        }
        let headers: Vec<String> = tokenize_line(header_line.text)?;
        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::MissingHeader);
        }

        let rows = lines
            .enumerate()
            .map(|(idx, line)| {
                let row_number = idx + 1;
                if line.broken_quote {
                    return RawRow {
                        row_number,
                        values: Vec::new(),
                        parse_error: Some(format!(
                            "quoted field opened on line {} is never closed",
                            line.first_line
                        )),
                    };
                }
                match tokenize_line(line.text) {
                    Ok(values) => RawRow {
                        row_number,
                        values,
                        parse_error: None,
                    },
                    Err(e) => RawRow {
                        row_number,
                        values: Vec::new(),
                        parse_error: Some(format!("line {}: {}", line.first_line, e)),
                    },
                }
            })
            .collect();

        Ok(ParsedCsv { headers, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_csv_parser_basic() {
        let parsed = CsvParser
            .parse_str("Trip ID,Date,Driver\nT1,2025-01-15,John Smith\nT2,2025-01-15,Jane Doe\n")
            .unwrap();

        assert_eq!(parsed.headers, vec!["Trip ID", "Date", "Driver"]);
        assert_eq!(parsed.expected_rows(), 2);
        assert_eq!(parsed.rows[0].get(0), Some("T1"));
        assert_eq!(parsed.rows[1].row_number, 2);
    }

    #[test]
    fn test_blank_lines_are_rows() {
        let parsed = CsvParser
            .parse_str("Trip ID,Date\nT1,2025-01-15\n\n,\nT2,2025-01-15")
            .unwrap();

        assert_eq!(parsed.expected_rows(), 4);
        assert!(parsed.rows[1].is_blank());
        assert!(parsed.rows[2].is_blank());
        assert!(!parsed.rows[3].is_blank());
    }

    #[test]
    fn test_quoted_multiline_field_is_one_row() {
        let parsed = CsvParser
            .parse_str("Trip ID,Notes\r\nT1,\"line one\r\nline two\"\r\nT2,ok\r\n")
            .unwrap();

        assert_eq!(parsed.expected_rows(), 2);
        assert_eq!(parsed.rows[0].get(1), Some("line one\r\nline two"));
        assert_eq!(parsed.rows[1].get(0), Some("T2"));
    }

    #[test]
    fn test_stray_quote_in_unquoted_field_is_literal() {
        let parsed = CsvParser
            .parse_str("Trip ID,Vehicle\nT1,Van 12\"\nT2,Van 3\nT3,Van 4\n")
            .unwrap();

        assert_eq!(parsed.expected_rows(), 3);
        assert_eq!(parsed.rows[0].get(1), Some("Van 12\""));
        assert_eq!(parsed.rows[2].get(0), Some("T3"));
    }

    #[test]
    fn test_unclosed_quote_does_not_swallow_later_lines() {
        let parsed = CsvParser
            .parse_str("Trip ID,Vehicle\nT1,\"Van 12\nT2,Van 3\nT3,Van 4\n")
            .unwrap();

        assert_eq!(parsed.expected_rows(), 3);
        assert!(parsed.rows[0].parse_error.as_ref().unwrap().contains("line 2"));
        assert_eq!(parsed.rows[1].get(0), Some("T2"));
        assert_eq!(parsed.rows[2].get(0), Some("T3"));
    }

    #[test]
    fn test_quote_closing_into_stray_text_across_lines_is_broken() {
        // `"Van 12` never closes cleanly: the next line's quote is followed by text
        let parsed = CsvParser
            .parse_str("Trip ID,Vehicle\nT1,\"Van 12\nT2,\"Van\" 3\nT3,Van 4\n")
            .unwrap();

        assert_eq!(parsed.expected_rows(), 3);
        assert!(parsed.rows[0].parse_error.is_some());
        assert_eq!(parsed.rows[2].get(0), Some("T3"));
    }

    #[test]
    fn test_escaped_quotes_inside_quoted_field() {
        let parsed = CsvParser
            .parse_str("Trip ID,Vehicle\nT1,\"Van \"\"12\"\"\"\nT2,Van 3\n")
            .unwrap();

        assert_eq!(parsed.expected_rows(), 2);
        assert_eq!(parsed.rows[0].get(1), Some("Van \"12\""));
    }

    #[test]
    fn test_bare_carriage_return_is_a_row_error() {
        let parsed = CsvParser
            .parse_str("Trip ID,Vehicle\nT1,Van 12\rT9,Van 9\nT2,Van 3\n")
            .unwrap();

        assert_eq!(parsed.expected_rows(), 2);
        assert!(parsed.rows[0].parse_error.is_some());
        assert_eq!(parsed.rows[1].get(0), Some("T2"));
    }

    #[test]
    fn test_bom_is_stripped_from_header() {
        let parsed = CsvParser.parse_str("\u{feff}Trip ID,Date\nT1,2025-01-15\n").unwrap();
        assert_eq!(parsed.headers[0], "Trip ID");
    }

    #[test]
    fn test_empty_content_has_no_header() {
        assert!(matches!(
            CsvParser.parse_str(""),
            Err(ImportError::MissingHeader)
        ));
        assert!(matches!(
            CsvParser.parse_str(" , \n"),
            Err(ImportError::MissingHeader)
        ));
    }

    #[test]
    fn test_read_file() {
        let mut temp_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "Trip ID,Date").unwrap();
        writeln!(temp_file, "T1,2025-01-15").unwrap();

        let bytes = CsvParser.read_file(temp_file.path()).unwrap();
        assert_eq!(bytes, b"Trip ID,Date\nT1,2025-01-15\n");
    }

    #[test]
    fn test_read_file_rejects_other_extensions() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("xlsx");
        std::fs::write(&path, b"x").unwrap();
        assert!(CsvParser.read_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_read_file_not_found() {
        assert!(CsvParser.read_file(Path::new("non_existent.csv")).is_err());
    }
}
