use lumen_glsl::SourceError;
use thiserror::Error;

use crate::shader::{CompileError, LayoutError};

/// Everything that can go wrong while building or rebuilding shaders.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Link failure; `log` is the driver's message, not source-mapped.
    #[error("failed to link shader program {program}:\n{log}")]
    Link { program: String, log: String },

    /// More distinct attribute names than the backend has slots.
    #[error("too many vertex attributes (max {max}): {}", bindings.join(", "))]
    TooManyAttributes { max: u32, bindings: Vec<String> },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// A shader definition named neither a URI nor inline source.
    #[error("shader definition has neither a uri nor source text")]
    MissingSource,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T, E = ShaderError> = std::result::Result<T, E>;
