use crate::reader::Line;
use thiserror::Error;
use tracing::debug;

/// Per-file parse failures
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("header row with marker column '{marker}' not found in first {lines_scanned} lines")]
    HeaderNotFound { marker: String, lines_scanned: usize },

    #[error("file has a header but no data rows")]
    EmptyFile,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How to locate the header row
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Header token that marks the header row (default: `Time`)
    pub marker_column: String,
    /// Lines scanned for the header before giving up (default: 1000)
    pub header_search_lines: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            marker_column: "Time".to_string(),
            header_search_lines: 1000,
        }
    }
}

/// A data row whose token count matches the header
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    line: &'a str,
    token_count: usize,
}

impl<'a> DataRow<'a> {
    pub fn tokens(&self) -> std::str::SplitAsciiWhitespace<'a> {
        self.line.split_ascii_whitespace()
    }

    pub fn len(&self) -> usize {
        self.token_count
    }

    pub fn is_empty(&self) -> bool {
        self.token_count == 0
    }
}

/// Receiver of parsed header and data rows
pub trait RowSink {
    fn on_header(&mut self, header: &[String]);
    fn on_row(&mut self, row: &DataRow<'_>);
}

/// Row-level counters for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCounters {
    pub rows_accepted: u64,
    /// Rows dropped for a token count mismatch, bad UTF-8 or excessive length
    pub rows_skipped: u64,
    pub blank_lines: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    SearchingHeader,
    SkippingUnits,
    Rows,
}

/// Line-at-a-time tokenizer for fixed-column simulation output
///
/// Layout: free-form preamble, a header row containing the marker column, one units
/// row, then whitespace-separated data rows. Rows whose token count differs from the
/// header are skipped, never accumulated.
#[derive(Debug)]
pub struct RowParser {
    options: ParseOptions,
    state: ParserState,
    header_len: usize,
    lines_scanned: usize,
    counters: RowCounters,
}

impl RowParser {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            state: ParserState::SearchingHeader,
            header_len: 0,
            lines_scanned: 0,
            counters: RowCounters::default(),
        }
    }

    /// True once the header has been located
    pub fn header_found(&self) -> bool {
        self.state != ParserState::SearchingHeader
    }

    pub fn counters(&self) -> &RowCounters {
        &self.counters
    }

    pub fn feed<S: RowSink>(&mut self, line: Line<'_>, sink: &mut S) -> Result<(), ParseError> {
        match self.state {
            ParserState::SearchingHeader => self.search_header(line, sink),
            ParserState::SkippingUnits => {
                self.state = ParserState::Rows;
                Ok(())
            }
            ParserState::Rows => {
                self.data_line(line, sink);
                Ok(())
            }
        }
    }

    /// Close out the file; fails if the header never appeared
    pub fn finish(&self) -> Result<RowCounters, ParseError> {
        if self.state == ParserState::SearchingHeader {
            return Err(self.header_not_found());
        }
        Ok(self.counters.clone())
    }

    fn search_header<S: RowSink>(&mut self, line: Line<'_>, sink: &mut S) -> Result<(), ParseError> {
        if self.lines_scanned >= self.options.header_search_lines {
            return Err(self.header_not_found());
        }
        self.lines_scanned += 1;

        let Line::Text(bytes) = line else {
            return Ok(());
        };
        let decoded = String::from_utf8_lossy(bytes);
        // Editors on Windows often prefix the first line with a byte-order mark
        let text = decoded.strip_prefix('\u{FEFF}').unwrap_or(&*decoded);
        let marker = self.options.marker_column.as_str();

        if text.split_ascii_whitespace().any(|token| token == marker) {
            let header: Vec<String> = text.split_ascii_whitespace().map(str::to_owned).collect();
            debug!(
                "Header found at line {} with {} columns",
                self.lines_scanned,
                header.len()
            );
            self.header_len = header.len();
            sink.on_header(&header);
            self.state = ParserState::SkippingUnits;
        }
        Ok(())
    }

    fn data_line<S: RowSink>(&mut self, line: Line<'_>, sink: &mut S) {
        let text = match line {
            Line::Text(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    self.counters.rows_skipped += 1;
                    return;
                }
            },
            Line::Oversized => {
                self.counters.rows_skipped += 1;
                return;
            }
        };

        let token_count = text.split_ascii_whitespace().count();
        if token_count == 0 {
            self.counters.blank_lines += 1;
            return;
        }
        if token_count != self.header_len {
            self.counters.rows_skipped += 1;
            return;
        }

        self.counters.rows_accepted += 1;
        sink.on_row(&DataRow { line: text, token_count });
    }

    fn header_not_found(&self) -> ParseError {
        ParseError::HeaderNotFound {
            marker: self.options.marker_column.clone(),
            lines_scanned: self.lines_scanned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    }

    impl RowSink for Recorder {
        fn on_header(&mut self, header: &[String]) {
            self.header = header.to_vec();
        }

        fn on_row(&mut self, row: &DataRow<'_>) {
            self.rows.push(row.tokens().map(str::to_owned).collect());
        }
    }

    fn parse(content: &str, options: ParseOptions) -> (Recorder, Result<RowCounters, ParseError>) {
        let mut parser = RowParser::new(options);
        let mut recorder = Recorder::default();
        for line in content.lines() {
            if let Err(e) = parser.feed(Line::Text(line.as_bytes()), &mut recorder) {
                return (recorder, Err(e));
            }
        }
        let result = parser.finish();
        (recorder, result)
    }

    #[test]
    fn test_header_units_and_rows() {
        let content = "Simulation preamble\nrun at time 0\n\nTime GenPwr WindHubVelX\n(s) (kW) (m/s)\n0.0 100 3\n0.1 200 4\n";
        let (recorder, counters) = parse(content, ParseOptions::default());
        let counters = counters.unwrap();

        assert_eq!(recorder.header, vec!["Time", "GenPwr", "WindHubVelX"]);
        assert_eq!(recorder.rows.len(), 2);
        assert_eq!(recorder.rows[1], vec!["0.1", "200", "4"]);
        assert_eq!(counters.rows_accepted, 2);
        assert_eq!(counters.rows_skipped, 0);
    }

    #[test]
    fn test_marker_matches_whole_token_only() {
        let content = "Timestamp column list\nTime GenPwr\n(s) (kW)\n1 2\n";
        let (recorder, counters) = parse(content, ParseOptions::default());
        assert_eq!(recorder.header, vec!["Time", "GenPwr"]);
        assert_eq!(counters.unwrap().rows_accepted, 1);
    }

    #[test]
    fn test_rows_with_wrong_token_count_are_skipped() {
        let content = "Time GenPwr WindHubVelX\n(s) (kW) (m/s)\n0 100 3\n0.1 200\n0.2 300 4 9\n\n0.3 400 5\n0.4";
        let (recorder, counters) = parse(content, ParseOptions::default());
        let counters = counters.unwrap();

        assert!(recorder.rows.iter().all(|row| row.len() == 3));
        assert_eq!(counters.rows_accepted, 2);
        assert_eq!(counters.rows_skipped, 3);
        assert_eq!(counters.blank_lines, 1);
    }

    #[test]
    fn test_header_not_found_in_window() {
        let mut content = String::new();
        for i in 0..20 {
            content.push_str(&format!("preamble line {i}\n"));
        }
        content.push_str("Time GenPwr\n(s) (kW)\n0 1\n");

        let options = ParseOptions { header_search_lines: 10, ..Default::default() };
        let (_, result) = parse(&content, options);
        match result {
            Err(ParseError::HeaderNotFound { marker, lines_scanned }) => {
                assert_eq!(marker, "Time");
                assert_eq!(lines_scanned, 10);
            }
            other => panic!("expected HeaderNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_header_missing_entirely() {
        let (_, result) = parse("just\nsome\ntext\n", ParseOptions::default());
        assert!(matches!(result, Err(ParseError::HeaderNotFound { lines_scanned: 3, .. })));
    }

    #[test]
    fn test_byte_order_mark_before_header() {
        let (recorder, counters) = parse("\u{FEFF}Time GenPwr\n(s) (kW)\n0 7\n", ParseOptions::default());
        assert_eq!(recorder.header, vec!["Time", "GenPwr"]);
        assert_eq!(recorder.rows, vec![vec!["0", "7"]]);
        assert_eq!(counters.unwrap().rows_accepted, 1);
    }

    #[test]
    fn test_custom_marker_column() {
        let options = ParseOptions { marker_column: "Sec".to_string(), ..Default::default() };
        let (recorder, counters) = parse("Sec GenPwr\n- -\n1 5\n", options);
        assert_eq!(recorder.header[0], "Sec");
        assert_eq!(counters.unwrap().rows_accepted, 1);
    }

    #[test]
    fn test_invalid_utf8_and_oversized_rows_skipped() {
        let mut parser = RowParser::new(ParseOptions::default());
        let mut recorder = Recorder::default();
        parser.feed(Line::Text(b"Time GenPwr"), &mut recorder).unwrap();
        parser.feed(Line::Text(b"(s) (kW)"), &mut recorder).unwrap();
        parser.feed(Line::Text(&[0xFF, 0x20, 0x31]), &mut recorder).unwrap();
        parser.feed(Line::Oversized, &mut recorder).unwrap();
        parser.feed(Line::Text(b"1 2"), &mut recorder).unwrap();

        let counters = parser.finish().unwrap();
        assert_eq!(counters.rows_accepted, 1);
        assert_eq!(counters.rows_skipped, 2);
    }
}
