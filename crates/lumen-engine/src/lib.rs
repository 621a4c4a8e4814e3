//! Lumen engine crate.
//!
//! Shader compilation and program management on top of [`lumen_glsl`]:
//!
//! - [`backend`]: the GPU operations the core needs, with a `glow` implementation
//! - [`shader`]: compile units, compile-log mapping, std140 block packing, linking
//! - [`ShaderContext`]: owns everything and drives live recompilation
//!
//! ```no_run
//! use lumen_engine::{ContextOptions, GlowBackend, ShaderContext, ShaderDef, TexUnits};
//!
//! # fn demo(gl: glow::Context) -> Result<(), lumen_engine::ShaderError> {
//! let options = ContextOptions { shared_uniform_blocks: vec!["Camera".into()], ..Default::default() };
//! let mut ctx = ShaderContext::new(GlowBackend::new(gl), options);
//! ctx.registry_mut().add("quad.vs", "in vec2 pos;\nvoid main() { gl_Position = vec4(pos, 0.0, 1.0); }")?;
//! ctx.registry_mut().add("blur.fs", "out vec4 color;\nvoid main() { color = vec4(1.0); }")?;
//!
//! let blur = ctx.new_program(&ShaderDef::uri("quad.vs"), &ShaderDef::uri("blur.fs").define("TAPS", 9), &TexUnits::new())?;
//! ctx.set_uniform(blur, "radius", 2.0f32);
//!
//! // later, from an editor:
//! let report = ctx.update_source("blur.fs", "out vec4 color;\nvoid main() { color = vec4(0.5); }")?;
//! for err in &report.errors {
//!     log::error!("{err}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod logging;
pub mod shader;

mod context;
mod error;

pub use backend::{Backend, GlowBackend, ShaderStage};
pub use context::{ContextOptions, ProgramDef, ShaderContext, ShaderDef, DEFAULT_PREAMBLE};
pub use error::{Result, ShaderError};
pub use shader::{BlockValues, CompileError, Diagnostic, ProgramId, RecompileReport, TexUnits, UniformValue, UnitId};
