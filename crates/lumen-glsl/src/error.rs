use thiserror::Error;

/// Errors raised by the source registry and the preprocessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Lookup of a URI that was never registered.
    #[error("shader source {uri} not registered")]
    NotFound { uri: String },

    /// A URI was registered a second time with different text.
    #[error("shader fragment {uri} already registered with different source")]
    Conflict { uri: String },

    /// `#include` cycle found while expanding a fragment.
    ///
    /// `chain` starts at the entry fragment and ends with the fragment that
    /// closes the cycle, e.g. `[a, b, a]`.
    #[error("circular include of {} detected: [{}]", chain.last().map(String::as_str).unwrap_or(""), chain.join(", "))]
    CircularInclude { chain: Vec<String> },

    /// The external fetcher failed to retrieve a fragment.
    #[error("failed to fetch {uri}: {message}")]
    Fetch { uri: String, message: String },
}

impl SourceError {
    pub(crate) fn not_found(uri: impl Into<String>) -> Self {
        Self::NotFound { uri: uri.into() }
    }
}
