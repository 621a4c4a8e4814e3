/// Origin URI used for the preamble lines of a flattened shader.
pub const PREAMBLE_URI: &str = "__preamble__";
/// Origin URI used for the generated `#define` lines of a flattened shader.
pub const DEFINES_URI: &str = "__defines__";

/// A run of consecutive flattened lines that came from one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    pub uri: String,
    /// 1-based line in `uri` of the span's first line.
    pub first_line: usize,
    pub line_count: usize,
}

/// Resolved origin of a flattened line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub uri: String,
    /// 1-based.
    pub line: usize,
}

/// Maps line numbers of a flattened shader back to the fragments they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    spans: Vec<SourceSpan>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a span covering the next `line_count` flattened lines.
    pub fn append(&mut self, uri: impl Into<String>, first_line: usize, line_count: usize) {
        self.spans.push(SourceSpan { uri: uri.into(), first_line, line_count });
    }

    pub fn spans(&self) -> &[SourceSpan] {
        &self.spans
    }

    /// Total number of flattened lines covered.
    pub fn line_count(&self) -> usize {
        self.spans.iter().map(|s| s.line_count).sum()
    }

    /// Origin of the 1-based flattened line `flat_line`.
    ///
    /// Returns `None` for line 0 or for lines past the end of the map.
    pub fn locate(&self, flat_line: usize) -> Option<SourceLocation> {
        let mut remaining = flat_line.checked_sub(1)?;
        for span in &self.spans {
            if remaining < span.line_count {
                return Some(SourceLocation {
                    uri: span.uri.clone(),
                    line: span.first_line + remaining,
                });
            }
            remaining -= span.line_count;
        }
        None
    }
}
