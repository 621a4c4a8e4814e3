//! GPU backend boundary.
//!
//! The shader core drives compilation, linking, reflection, and uniform
//! uploads through [`Backend`]. [`GlowBackend`] implements it over OpenGL /
//! WebGL2; tests use a scripted backend that records every call.

mod gl;
#[cfg(test)]
pub(crate) mod mock;

pub use self::gl::GlowBackend;

use crate::shader::{GlslType, UniformValue};

/// Programmable pipeline stage of a compile unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Suffix used for anonymous sources (`__anonymous__.vs`).
    pub fn extension(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Fragment => "fs",
        }
    }
}

/// One active uniform of a linked program, as reflected by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// Reflected name; arrays carry a trailing `[0]`, block members may be
    /// prefixed with `Block.`.
    pub name: String,
    /// Raw GL type enum.
    pub gl_type: u32,
    /// Array length, 1 for non-arrays.
    pub size: u32,
    /// Index of the owning uniform block, if any.
    pub block_index: Option<u32>,
    /// Byte offset inside the owning block.
    pub offset: Option<u32>,
}

/// One active uniform block of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniformBlock {
    pub index: u32,
    pub name: String,
    /// `GL_UNIFORM_BLOCK_DATA_SIZE`, in bytes.
    pub data_size: u32,
}

/// The GPU operations the shader core needs.
///
/// Compile and link report failures as the driver's info log; everything the
/// core can do nothing about is an [`anyhow::Error`].
pub trait Backend {
    type Shader;
    type Program;
    type Buffer;
    type Location: Clone;

    fn create_shader_stage(&self, stage: ShaderStage) -> anyhow::Result<Self::Shader>;
    fn delete_shader_stage(&self, shader: &Self::Shader);
    /// Compiles `source` into `shader`; `Err` holds the info log.
    fn compile_shader_stage(&self, shader: &Self::Shader, source: &str) -> Result<(), String>;

    fn create_program(&self) -> anyhow::Result<Self::Program>;
    fn delete_program(&self, program: &Self::Program);
    fn attach_stage(&self, program: &Self::Program, shader: &Self::Shader);
    /// Links `program`; `Err` holds the info log.
    fn link_program(&self, program: &Self::Program) -> Result<(), String>;

    /// Names of the active vertex attributes.
    fn active_attributes(&self, program: &Self::Program) -> Vec<String>;
    fn active_uniform_blocks(&self, program: &Self::Program) -> Vec<ActiveUniformBlock>;
    fn active_uniforms(&self, program: &Self::Program) -> Vec<ActiveUniform>;

    fn bind_attrib_location(&self, program: &Self::Program, index: u32, name: &str);
    fn uniform_block_binding(&self, program: &Self::Program, block_index: u32, binding: u32);
    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<Self::Location>;

    fn create_buffer(&self) -> anyhow::Result<Self::Buffer>;
    /// Uploads `data` into `buffer` and binds it to uniform-buffer slot `binding`.
    fn upload_uniform_buffer(&self, buffer: &Self::Buffer, binding: u32, data: &[u8]);
    /// Binds `buffer` to uniform-buffer slot `binding` without touching its contents.
    fn bind_uniform_buffer(&self, buffer: &Self::Buffer, binding: u32);
    fn delete_buffer(&self, buffer: &Self::Buffer);

    fn use_program(&self, program: &Self::Program);
    /// Typed `glUniform*` dispatch for a reflected uniform of type `ty`.
    fn set_uniform(&self, location: &Self::Location, ty: GlslType, value: &UniformValue<'_>);

    /// `GL_MAX_VERTEX_ATTRIBS`.
    fn max_vertex_attribs(&self) -> u32;
}
