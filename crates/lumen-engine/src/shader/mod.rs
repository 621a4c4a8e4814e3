//! Compile units, programs, uniform blocks, and the edit → rebuild tracker.

mod compile;
mod dirty;
mod glsl_type;
mod program;
mod uniform_block;
mod value;

pub use compile::{parse_compile_log, CompileError, Diagnostic, ShaderUnit};
pub use dirty::{find_dirty, unit_depends_on, DirtySet, RecompileReport};
pub use glsl_type::{BlockShape, GlslType, StorageKind};
pub use program::{AttribBindings, SamplerBinding, SharedBlocks, ShaderProgram, TexUnits};
pub use uniform_block::{BlockLayout, BlockPacker, FieldLayout, LayoutError, UniformBlock};
pub use value::{BlockValues, UniformValue};

pub(crate) use program::LinkEnv;
pub(crate) use value::Scalar;

/// Index of a compile unit inside its [`ShaderContext`](crate::ShaderContext).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) usize);

/// Index of a program inside its [`ShaderContext`](crate::ShaderContext).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub(crate) usize);
