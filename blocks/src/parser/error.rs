use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

use crate::graph::GraphError;

/// A problem in a program sketch, located by byte span. Sketch loading
/// collects these instead of stopping at the first one.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Range<usize>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn error(message: impl Into<String>, span: Range<usize>, file_id: usize) -> Self {
        ParseError {
            message: message.into(),
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    /// A graph mutation refused while wiring up the sketch.
    pub fn from_graph(error: &GraphError, span: Range<usize>, file_id: usize) -> Self {
        ParseError::error(format!("cannot build program: {}", error), span, file_id)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// 1-based line the error starts on.
    pub fn line(&self, source: &str) -> usize {
        let end = self.span.start.min(source.len());
        source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
    }

    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::error()
            .with_message(&self.message)
            .with_labels(vec![
                Label::primary(self.file_id, self.span.clone()).with_message("in this item"),
            ])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
