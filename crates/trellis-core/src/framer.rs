//! Framing of concatenated JSON array documents on the tool's stdout
//!
//! The analysis tool may print several top-level arrays back to back with no
//! delimiter. The framer works line by line and tracks bracket depth: a document
//! ends when the accumulated buffer is non-empty and the depth is back to zero.
//!
//! Known limitations of the depth counter:
//! - brackets inside string literals are counted like structural ones, so an
//!   unbalanced bracket inside a string desynchronizes framing;
//! - every document must be a top-level array;
//! - a document must end at a line boundary. Two documents on one line, or a line
//!   where depth touches zero before its end, are handed to the JSON parser as one
//!   buffer and rejected.

use crate::error::ParseError;
use crate::model::{Graph, Node};

/// Incremental framer. Feed lines with [`push_line`](Self::push_line) and call
/// [`finish`](Self::finish) once the stream is exhausted.
#[derive(Debug, Default)]
pub struct StreamDocumentFramer {
    buffer: String,
    depth: i64,
    documents: usize,
}

impl StreamDocumentFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one line. Returns the nodes of a document when this line closes it.
    pub fn push_line(&mut self, line: &str) -> Result<Option<Vec<Node>>, ParseError> {
        let opened = line.matches('[').count() as i64;
        let closed = line.matches(']').count() as i64;

        self.buffer.push_str(line);
        self.buffer.push('\n');
        self.depth += opened - closed;

        if self.depth < 0 {
            return Err(ParseError::new(
                "closing bracket without a matching opening bracket",
                std::mem::take(&mut self.buffer),
            ));
        }

        if self.depth != 0 || self.buffer.trim().is_empty() {
            if self.depth == 0 {
                // blank line between documents
                self.buffer.clear();
            }
            return Ok(None);
        }

        let buffer = std::mem::take(&mut self.buffer);
        let nodes = parse_document(&buffer)?;
        self.documents += 1;
        Ok(Some(nodes))
    }

    /// Number of complete documents framed so far.
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Fails when input ended in the middle of a document.
    pub fn finish(self) -> Result<(), ParseError> {
        if self.depth != 0 {
            return Err(ParseError::new(
                format!("unterminated document (bracket depth {} at end of output)", self.depth),
                self.buffer,
            ));
        }
        Ok(())
    }
}

fn parse_document(buffer: &str) -> Result<Vec<Node>, ParseError> {
    match serde_json::from_str::<Node>(buffer) {
        Ok(Node::Array(nodes)) => Ok(nodes),
        Ok(other) => Err(ParseError::new(
            format!("expected a top-level array, found {}", json_kind(&other)),
            buffer,
        )),
        Err(e) => Err(ParseError::new(e.to_string(), buffer)),
    }
}

fn json_kind(value: &Node) -> &'static str {
    match value {
        Node::Null => "null",
        Node::Bool(_) => "a boolean",
        Node::Number(_) => "a number",
        Node::String(_) => "a string",
        Node::Array(_) => "an array",
        Node::Object(_) => "an object",
    }
}

/// Decode the complete stdout of one tool run into a flat graph.
///
/// Empty or whitespace-only output yields an empty graph.
pub fn decode(raw: &str) -> Result<Graph, ParseError> {
    let mut framer = StreamDocumentFramer::new();
    let mut graph = Graph::new();

    for line in raw.trim().split('\n') {
        if let Some(document) = framer.push_line(line)? {
            graph.extend_document(document);
        }
    }

    tracing::trace!(documents = framer.documents(), nodes = graph.node_count(), "decoded tool output");
    framer.finish()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_concatenated_documents_are_flattened() {
        let graph = decode("[{\"id\":1}]\n[{\"id\":2},{\"id\":3}]").unwrap();
        assert_eq!(
            graph.nodes(),
            &[json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]
        );
    }

    #[test]
    fn test_multiline_document() {
        let raw = "[\n  {\"id\": \"a\", \"edges\": [\"b\"]},\n  {\"id\": \"b\", \"edges\": []}\n]\n[{\"id\": \"c\"}]\n";
        let graph = decode(raw).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.nodes()[0]["edges"], json!(["b"]));
        assert_eq!(graph.nodes()[2]["id"], "c");
    }

    #[test]
    fn test_nested_arrays_stay_nested() {
        let graph = decode("[[1, 2], [3]]").unwrap();
        assert_eq!(graph.nodes(), &[json!([1, 2]), json!([3])]);
    }

    #[test]
    fn test_empty_and_whitespace_output() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("   \n\t\n  ").unwrap().is_empty());
    }

    #[test]
    fn test_empty_arrays_contribute_no_nodes() {
        let graph = decode("[]\n[{\"id\":1}]\n[]").unwrap();
        assert_eq!(graph.nodes(), &[json!({"id": 1})]);
    }

    #[test]
    fn test_blank_lines_between_documents() {
        let graph = decode("[1]\n\n\n[2]").unwrap();
        assert_eq!(graph.nodes(), &[json!(1), json!(2)]);
    }

    #[test]
    fn test_unterminated_document_is_an_error() {
        let err = decode("[{\"id\":1}]\n[{\"id\":2},\n{\"id\":3}").unwrap_err();
        assert!(err.message.contains("unterminated"));
        assert!(err.buffer.contains("\"id\":2"));
        assert!(!err.buffer.contains("\"id\":1"));
    }

    #[test]
    fn test_stray_closing_bracket() {
        let err = decode("[1]\n]").unwrap_err();
        assert!(err.message.contains("closing bracket"));
    }

    #[test]
    fn test_invalid_json_reports_buffer() {
        let err = decode("[1, 2,]").unwrap_err();
        assert_eq!(err.buffer.trim(), "[1, 2,]");
    }

    #[test]
    fn test_two_documents_on_one_line_are_rejected() {
        assert!(decode("[1][2]").is_err());
    }

    #[test]
    fn test_non_array_document_is_rejected() {
        let err = decode("{\"nodes\": [1]}").unwrap_err();
        assert!(err.message.contains("an object"));
    }

    #[test]
    fn test_incremental_framing() {
        let mut framer = StreamDocumentFramer::new();
        assert_eq!(framer.push_line("[").unwrap(), None);
        assert_eq!(framer.push_line("  {\"id\": 1}").unwrap(), None);
        assert_eq!(framer.push_line("]").unwrap(), Some(vec![json!({"id": 1})]));
        assert_eq!(framer.documents(), 1);
        assert!(framer.finish().is_ok());
    }
}
