// Subordinate Output Parsing
// accumulate -> split on newline -> classify line -> {progress, result, ignore}

use crate::domain::event::ProgressEvent;
use serde_json::Value;

/// Keys that mark a parsed object as a final result rather than noise.
/// Validation results carry counts, sort results carry stats/success.
const FINAL_RESULT_KEYS: [&str; 4] = ["error_count", "is_valid", "stats", "success"];

/// Classification of one complete output line
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(ProgressEvent),
    FinalResult(Value),
    Ignored,
}

/// Classify a single line of subordinate stdout
///
/// Unparseable lines and objects without a recognized marker are ignored:
/// the subordinate may interleave free-text diagnostics with structured events.
pub fn classify_line(line: &str) -> OutputLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return OutputLine::Ignored;
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return OutputLine::Ignored,
    };

    let Value::Object(mut obj) = value else {
        return OutputLine::Ignored;
    };

    if obj.get("type").and_then(Value::as_str) == Some("progress") {
        // The tag is re-added when the event is serialized
        obj.remove("type");
        return match serde_json::from_value::<ProgressEvent>(Value::Object(obj)) {
            Ok(event) => OutputLine::Progress(event),
            Err(_) => OutputLine::Ignored,
        };
    }

    if FINAL_RESULT_KEYS.iter().any(|key| obj.contains_key(*key)) {
        return OutputLine::FinalResult(Value::Object(obj));
    }

    OutputLine::Ignored
}

/// Rolling byte buffer that yields complete lines
///
/// Works on bytes so a multi-byte character split across two reads is
/// decoded only once the whole line has arrived.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every newline-terminated line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Unterminated trailing content, if any
    pub fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).trim().to_string();
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}

/// Output state machine for one job run
///
/// Progress events are handed back to the caller as they complete; the final
/// result is held until the process exits.
#[derive(Debug, Default)]
pub struct OutputParser {
    splitter: LineSplitter,
    final_result: Option<Value>,
}

impl OutputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a stdout chunk, returning the progress events it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ProgressEvent> {
        let mut progress = Vec::new();
        for line in self.splitter.push(chunk) {
            match classify_line(&line) {
                OutputLine::Progress(event) => progress.push(event),
                OutputLine::FinalResult(value) => self.final_result = Some(value),
                OutputLine::Ignored => {
                    tracing::trace!(line = %line, "Ignoring unstructured output line");
                }
            }
        }
        progress
    }

    /// Final result captured from the stream, or parsed from trailing content
    pub fn finish(self) -> Option<Value> {
        if self.final_result.is_some() {
            return self.final_result;
        }

        self.splitter
            .finish()
            .and_then(|rest| serde_json::from_str::<Value>(&rest).ok())
            .filter(Value::is_object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_progress_line() {
        let line = r#"{"type": "progress", "stage": "json_files", "percent": 0, "message": "Validating JSON files..."}"#;

        assert_eq!(
            classify_line(line),
            OutputLine::Progress(ProgressEvent::new("json_files", 0, "Validating JSON files..."))
        );
    }

    #[test]
    fn test_classify_progress_keeps_number_and_extra_fields() {
        let line = r#"{"type": "progress", "stage": "sorting_data", "percent": 33.3, "eta_s": 4}"#;

        let OutputLine::Progress(event) = classify_line(line) else {
            panic!("expected progress");
        };
        assert_eq!(event.percent.as_f64(), Some(33.3));
        assert_eq!(event.message, "");
        assert_eq!(event.extra.get("eta_s"), Some(&json!(4)));
        assert!(!event.extra.contains_key("type"));
    }

    #[test]
    fn test_classify_final_results() {
        let validation = r#"{"errors": [], "error_count": 0, "warning_count": 2, "is_valid": true}"#;
        let sort = r#"{"success": true, "message": "Sorting complete", "dry_run": true, "stats": {"files_processed": 3}}"#;

        assert!(matches!(classify_line(validation), OutputLine::FinalResult(v) if v["is_valid"] == true));
        assert!(matches!(classify_line(sort), OutputLine::FinalResult(v) if v["stats"]["files_processed"] == 3));
    }

    #[test]
    fn test_classify_noise() {
        assert_eq!(classify_line("Running all validations..."), OutputLine::Ignored);
        assert_eq!(classify_line(""), OutputLine::Ignored);
        assert_eq!(classify_line("42"), OutputLine::Ignored);
        assert_eq!(classify_line(r#"{"hello": "world"}"#), OutputLine::Ignored);
        // progress marker but malformed body
        assert_eq!(classify_line(r#"{"type": "progress", "percent": "x"}"#), OutputLine::Ignored);
    }

    #[test]
    fn test_splitter_handles_partial_lines() {
        let mut splitter = LineSplitter::new();

        assert!(splitter.push(b"{\"a\":").is_empty());
        assert_eq!(splitter.push(b"1}\r\nnext"), vec!["{\"a\":1}".to_string()]);
        assert_eq!(splitter.push(b" line\n\n"), vec!["next line".to_string(), String::new()]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_splitter_keeps_multibyte_chars_across_chunks() {
        let mut splitter = LineSplitter::new();
        let text = "Fertig ✓\n".as_bytes();
        let (head, tail) = text.split_at(9); // inside the check mark

        assert!(splitter.push(head).is_empty());
        assert_eq!(splitter.push(tail), vec!["Fertig ✓".to_string()]);
    }

    #[test]
    fn test_parser_collects_progress_and_result() {
        let mut parser = OutputParser::new();

        let progress = parser.feed(
            b"noise\n{\"type\":\"progress\",\"stage\":\"folder-names\",\"percent\":50,\"message\":\"\"}\n",
        );
        assert_eq!(progress, vec![ProgressEvent::new("folder-names", 50, "")]);

        let progress = parser.feed(b"{\"error_count\":0,\"is_valid\":true}\n");
        assert!(progress.is_empty());

        assert_eq!(parser.finish(), Some(json!({"error_count": 0, "is_valid": true})));
    }

    #[test]
    fn test_parser_falls_back_to_trailing_buffer() {
        let mut parser = OutputParser::new();
        parser.feed(b"{\"success\": true, \"stats\": {}}");

        assert_eq!(parser.finish(), Some(json!({"success": true, "stats": {}})));
    }

    #[test]
    fn test_parser_ignores_trailing_noise() {
        let mut parser = OutputParser::new();
        parser.feed(b"Traceback (most recent call last):");

        assert_eq!(parser.finish(), None);
    }
}
