//! Tidy CSV loader with encoding and delimiter auto-detection.
//!
//! Splits a `State,Year,Value` style file into [`RawRecord`]s. Nothing is
//! parsed into numbers here; that is the normalizer's job.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::RawRecord;

/// Which header names hold the entity, year and value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_entity_column")]
    pub entity: String,
    #[serde(default = "default_year_column")]
    pub year: String,
    #[serde(default = "default_value_column")]
    pub value: String,
}

fn default_entity_column() -> String {
    "State".to_string()
}

fn default_year_column() -> String {
    "Year".to_string()
}

fn default_value_column() -> String {
    "Value".to_string()
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            entity: default_entity_column(),
            year: default_year_column(),
            value: default_value_column(),
        }
    }
}

/// Fallback names accepted for the entity column
const ENTITY_ALIASES: &[&str] = &["entity", "state"];

/// A line the CSV reader could not frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MalformedLine {
    pub line: usize,
    pub message: String,
}

/// Result of parsing with metadata
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    /// Split rows, in file order
    pub records: Vec<RawRecord>,
    /// 1-based file line of each record
    pub lines: Vec<usize>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
    /// Lines skipped by the CSV reader
    pub malformed: Vec<MalformedLine>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => s,
            Err(_) => String::from_utf8_lossy(bytes).to_string(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.to_string(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(label) => label.decode(bytes).0.to_string(),
            // Fallback: UTF-8 with lossy conversion
            None => String::from_utf8_lossy(bytes).to_string(),
        },
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Comma wins ties.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Printable form of a delimiter for logs and status lines.
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn find_column(headers: &[String], wanted: &str, aliases: &[&str]) -> LoadResult<usize> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header_name(h)).collect();
    std::iter::once(wanted)
        .chain(aliases.iter().copied())
        .find_map(|name| {
            let name = normalize_header_name(name);
            normalized.iter().position(|h| *h == name)
        })
        .ok_or_else(|| LoadError::MissingColumn {
            column: wanted.to_string(),
            found: headers.join(", "),
        })
}

/// Parse CSV text with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char, columns: &ColumnMapping) -> LoadResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(LoadError::EmptyFile);
    }
    if !delimiter.is_ascii() {
        return Err(LoadError::InvalidDelimiter(delimiter));
    }
    let delimiter_byte = delimiter as u8;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let entity_idx = find_column(&headers, &columns.entity, ENTITY_ALIASES)?;
    let year_idx = find_column(&headers, &columns.year, &[])?;
    let value_idx = find_column(&headers, &columns.value, &[])?;

    let mut records = Vec::new();
    let mut lines = Vec::new();
    let mut malformed = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line
        let fallback_line = idx + 2;
        match result {
            Ok(record) => {
                if record.iter().all(|field| field.is_empty()) {
                    continue;
                }
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                let field = |i: usize| record.get(i).unwrap_or("").to_string();
                records.push(RawRecord {
                    entity: field(entity_idx),
                    year: field(year_idx),
                    value: field(value_idx),
                });
                lines.push(line);
            }
            Err(e) => malformed.push(MalformedLine {
                line: e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line),
                message: e.to_string(),
            }),
        }
    }

    Ok(ParseResult {
        records,
        lines,
        encoding: "utf-8".to_string(),
        delimiter,
        headers,
        malformed,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], columns: &ColumnMapping) -> LoadResult<ParseResult> {
    parse_bytes(bytes, None, columns)
}

/// Parse CSV bytes; `delimiter` overrides detection when given.
pub fn parse_bytes(bytes: &[u8], delimiter: Option<char>, columns: &ColumnMapping) -> LoadResult<ParseResult> {
    if bytes.is_empty() {
        return Err(LoadError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));

    let mut result = parse_str(&content, delimiter, columns)?;
    result.encoding = encoding;
    Ok(result)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P, columns: &ColumnMapping) -> LoadResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_simple_csv() {
        let csv = "State,Year,Value\nUtah,2012,2855287\nOhio,2012,11544225\n";
        let result = parse_str(csv, ',', &ColumnMapping::default()).unwrap();

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0], RawRecord::new("Utah", "2012", "2855287"));
        assert_eq!(result.lines, vec![2, 3]);
        assert!(result.malformed.is_empty());
    }

    #[test]
    fn test_column_order_and_case_do_not_matter() {
        let csv = "value;YEAR;state;extra\n1.5;2013;Maine;x\n";
        let result = parse_str(csv, ';', &ColumnMapping::default()).unwrap();
        assert_eq!(result.records[0], RawRecord::new("Maine", "2013", "1.5"));
    }

    #[test]
    fn test_entity_alias() {
        let csv = "Entity,Year,Value\nUnited States,2012,314\n";
        let result = parse_str(csv, ',', &ColumnMapping::default()).unwrap();
        assert_eq!(result.records[0].entity, "United States");
    }

    #[test]
    fn test_quoted_values_with_delimiter() {
        let csv = "State,Year,Value\n\"Washington, D.C.\",2012,\"646,449\"\n";
        let result = parse_str(csv, ',', &ColumnMapping::default()).unwrap();
        assert_eq!(result.records[0].entity, "Washington, D.C.");
        // thousands separators are left for the normalizer to reject
        assert_eq!(result.records[0].value, "646,449");
    }

    #[test]
    fn test_short_rows_become_empty_fields() {
        let csv = "State,Year,Value\nUtah,2012\n";
        let result = parse_str(csv, ',', &ColumnMapping::default()).unwrap();
        assert_eq!(result.records[0].value, "");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = "State,Year,Value\nUtah,2012,1\n\n,,\nOhio,2012,2\n";
        let result = parse_str(csv, ',', &ColumnMapping::default()).unwrap();
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn test_missing_column_error() {
        let csv = "State,Value\nUtah,1\n";
        let err = parse_str(csv, ',', &ColumnMapping::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Year"));
        assert!(msg.contains("State, Value"));
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(
            parse_str("", ',', &ColumnMapping::default()),
            Err(LoadError::EmptyFile)
        ));
        assert!(matches!(
            parse_bytes_auto(b"", &ColumnMapping::default()),
            Err(LoadError::EmptyFile)
        ));
    }

    #[test]
    fn test_bom_header() {
        let csv = "\u{feff}State,Year,Value\nUtah,2012,1\n";
        let result = parse_str(csv, ',', &ColumnMapping::default()).unwrap();
        assert_eq!(result.headers[0], "State");
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_multibyte_delimiter_rejected() {
        let err = parse_str("a§b\n1§2", '§', &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDelimiter('§')));
    }

    #[test]
    fn test_latin1_range_delimiter_rejected() {
        // 'é' fits in a u8 but is two bytes in UTF-8
        let err = parse_str("aéb\n1é2", 'é', &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDelimiter('é')));

        let err = parse_bytes("State§Year§Value\nUtah§2012§1\n".as_bytes(), Some('§'), &ColumnMapping::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidDelimiter('§')));
    }

    #[test]
    fn test_format_delimiter() {
        assert_eq!(format_delimiter('\t'), "\\t");
        assert_eq!(format_delimiter(';'), ";");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse_semicolon() {
        let csv = "State;Year;Value\nUtah;2012;1\n";
        let result = parse_bytes_auto(csv.as_bytes(), &ColumnMapping::default()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.headers, vec!["State", "Year", "Value"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Québec" in ISO-8859-1
        let bytes: &[u8] = &[0x51, 0x75, 0xE9, 0x62, 0x65, 0x63];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Québec");
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "State,Year,Value").unwrap();
        writeln!(file, "Utah,2012,2855287").unwrap();

        let result = parse_csv_file_auto(file.path(), &ColumnMapping::default()).unwrap();
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = parse_csv_file_auto("/nonexistent/statedash.csv", &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
