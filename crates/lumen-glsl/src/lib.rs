//! Shader source management for **lumen**: a registry of GLSL fragments keyed
//! by URI, `#include` expansion, and the source maps that let compiler
//! diagnostics point back at the fragment a line came from.
//!
//! This crate has no GPU dependencies so it can be shared by the engine and
//! by offline tooling.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`registry`] | `SourceRegistry`, `SourceFragment` |
//! | [`include`] | `#include` directive scanning |
//! | [`defines`] | `ShaderDefines`, `instance_key` |
//! | [`preprocess`] | `preprocess`, `PreprocessedSource` |
//! | [`source_map`] | `SourceMap`, `SourceLocation` |
//! | [`fetch`] | `SourceFetcher`, `MemoizedFetcher`, `FileFetcher`, `FetchPlan` |
//! | [`error`] | `SourceError` |
//!
//! # Quick start
//!
//! ```rust
//! use lumen_glsl::{preprocess, ShaderDefines, SourceRegistry};
//!
//! let mut registry = SourceRegistry::new();
//! registry.add("math.glsl", "float sq(float x) { return x * x; }").unwrap();
//! registry.add("main.fs", "#include \"math.glsl\"\nvoid main() {}").unwrap();
//!
//! let pp = preprocess(&registry, "main.fs", &ShaderDefines::new(), "#version 300 es").unwrap();
//! let origin = pp.source_map.locate(2).unwrap();
//! assert_eq!(origin.uri, "math.glsl");
//! ```

pub mod defines;
pub mod error;
pub mod fetch;
pub mod include;
pub mod preprocess;
pub mod registry;
pub mod source_map;

pub use defines::{instance_key, DefineValue, ShaderDefines};
pub use error::SourceError;
pub use fetch::{FetchFuture, FetchPlan, FileFetcher, MemoizedFetcher, SourceFetcher};
pub use preprocess::{preprocess, preprocess_source, PreprocessedSource};
pub use registry::{SourceFragment, SourceRegistry};
pub use source_map::{SourceLocation, SourceMap, SourceSpan, DEFINES_URI, PREAMBLE_URI};
