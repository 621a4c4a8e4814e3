use anyhow::anyhow;
use glow::HasContext;

use super::{ActiveUniform, ActiveUniformBlock, Backend, ShaderStage};
use crate::shader::{GlslType, UniformValue};

type Gl = glow::Context;

/// [`Backend`] over a `glow` context (desktop GL 3.3+, GLES 3, WebGL2).
pub struct GlowBackend {
    gl: Gl,
}

impl GlowBackend {
    pub fn new(gl: Gl) -> Self {
        Self { gl }
    }

    /// Borrow the underlying context for draw calls the core does not wrap.
    pub fn gl(&self) -> &Gl {
        &self.gl
    }
}

impl Backend for GlowBackend {
    type Shader = <Gl as HasContext>::Shader;
    type Program = <Gl as HasContext>::Program;
    type Buffer = <Gl as HasContext>::Buffer;
    type Location = <Gl as HasContext>::UniformLocation;

    fn create_shader_stage(&self, stage: ShaderStage) -> anyhow::Result<Self::Shader> {
        let ty = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { self.gl.create_shader(ty) }.map_err(|e| anyhow!("failed to create {stage:?} shader: {e}"))
    }

    fn delete_shader_stage(&self, shader: &Self::Shader) {
        unsafe { self.gl.delete_shader(*shader) }
    }

    fn compile_shader_stage(&self, shader: &Self::Shader, source: &str) -> Result<(), String> {
        unsafe {
            self.gl.shader_source(*shader, source);
            self.gl.compile_shader(*shader);
            if self.gl.get_shader_compile_status(*shader) {
                Ok(())
            } else {
                Err(self.gl.get_shader_info_log(*shader))
            }
        }
    }

    fn create_program(&self) -> anyhow::Result<Self::Program> {
        unsafe { self.gl.create_program() }.map_err(|e| anyhow!("failed to create program: {e}"))
    }

    fn delete_program(&self, program: &Self::Program) {
        unsafe { self.gl.delete_program(*program) }
    }

    fn attach_stage(&self, program: &Self::Program, shader: &Self::Shader) {
        unsafe { self.gl.attach_shader(*program, *shader) }
    }

    fn link_program(&self, program: &Self::Program) -> Result<(), String> {
        unsafe {
            self.gl.link_program(*program);
            if self.gl.get_program_link_status(*program) {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(*program))
            }
        }
    }

    fn active_attributes(&self, program: &Self::Program) -> Vec<String> {
        unsafe {
            let count = self.gl.get_active_attributes(*program);
            (0..count)
                .filter_map(|i| self.gl.get_active_attribute(*program, i))
                .map(|a| a.name)
                .collect()
        }
    }

    fn active_uniform_blocks(&self, program: &Self::Program) -> Vec<ActiveUniformBlock> {
        unsafe {
            let count = self.gl.get_program_parameter_i32(*program, glow::ACTIVE_UNIFORM_BLOCKS).max(0) as u32;
            (0..count)
                .map(|index| ActiveUniformBlock {
                    index,
                    name: self.gl.get_active_uniform_block_name(*program, index),
                    data_size: self
                        .gl
                        .get_active_uniform_block_parameter_i32(*program, index, glow::UNIFORM_BLOCK_DATA_SIZE)
                        .max(0) as u32,
                })
                .collect()
        }
    }

    fn active_uniforms(&self, program: &Self::Program) -> Vec<ActiveUniform> {
        unsafe {
            let count = self.gl.get_active_uniforms(*program);
            let indices: Vec<u32> = (0..count).collect();
            let block_indices = self.gl.get_active_uniforms_parameter(*program, &indices, glow::UNIFORM_BLOCK_INDEX);
            let offsets = self.gl.get_active_uniforms_parameter(*program, &indices, glow::UNIFORM_OFFSET);

            indices
                .iter()
                .filter_map(|&i| {
                    let info = self.gl.get_active_uniform(*program, i)?;
                    let block_index = block_indices.get(i as usize).copied().filter(|&b| b >= 0).map(|b| b as u32);
                    let offset = block_index
                        .and(offsets.get(i as usize).copied())
                        .filter(|&o| o >= 0)
                        .map(|o| o as u32);
                    Some(ActiveUniform {
                        name: info.name,
                        gl_type: info.utype,
                        size: info.size.max(1) as u32,
                        block_index,
                        offset,
                    })
                })
                .collect()
        }
    }

    fn bind_attrib_location(&self, program: &Self::Program, index: u32, name: &str) {
        unsafe { self.gl.bind_attrib_location(*program, index, name) }
    }

    fn uniform_block_binding(&self, program: &Self::Program, block_index: u32, binding: u32) {
        unsafe { self.gl.uniform_block_binding(*program, block_index, binding) }
    }

    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<Self::Location> {
        unsafe { self.gl.get_uniform_location(*program, name) }
    }

    fn create_buffer(&self) -> anyhow::Result<Self::Buffer> {
        unsafe { self.gl.create_buffer() }.map_err(|e| anyhow!("failed to create uniform buffer: {e}"))
    }

    fn upload_uniform_buffer(&self, buffer: &Self::Buffer, binding: u32, data: &[u8]) {
        unsafe {
            self.gl.bind_buffer(glow::UNIFORM_BUFFER, Some(*buffer));
            self.gl.buffer_data_u8_slice(glow::UNIFORM_BUFFER, data, glow::DYNAMIC_DRAW);
            self.gl.bind_buffer_base(glow::UNIFORM_BUFFER, binding, Some(*buffer));
        }
    }

    fn bind_uniform_buffer(&self, buffer: &Self::Buffer, binding: u32) {
        unsafe { self.gl.bind_buffer_base(glow::UNIFORM_BUFFER, binding, Some(*buffer)) }
    }

    fn delete_buffer(&self, buffer: &Self::Buffer) {
        unsafe { self.gl.delete_buffer(*buffer) }
    }

    fn use_program(&self, program: &Self::Program) {
        unsafe { self.gl.use_program(Some(*program)) }
    }

    fn set_uniform(&self, location: &Self::Location, ty: GlslType, value: &UniformValue<'_>) {
        use GlslType::*;

        let loc = Some(location);
        let gl = &self.gl;
        let applied = unsafe {
            match ty {
                Float | Vec2 | Vec3 | Vec4 | Mat2 | Mat3 | Mat4 => value.as_f32s().map(|v| match ty {
                    Float => gl.uniform_1_f32_slice(loc, &v),
                    Vec2 => gl.uniform_2_f32_slice(loc, &v),
                    Vec3 => gl.uniform_3_f32_slice(loc, &v),
                    Vec4 => gl.uniform_4_f32_slice(loc, &v),
                    Mat2 => gl.uniform_matrix_2_f32_slice(loc, false, &v),
                    Mat3 => gl.uniform_matrix_3_f32_slice(loc, false, &v),
                    _ => gl.uniform_matrix_4_f32_slice(loc, false, &v),
                }),
                Uint | UVec2 | UVec3 | UVec4 => value.as_u32s().map(|v| match ty {
                    Uint => gl.uniform_1_u32_slice(loc, &v),
                    UVec2 => gl.uniform_2_u32_slice(loc, &v),
                    UVec3 => gl.uniform_3_u32_slice(loc, &v),
                    _ => gl.uniform_4_u32_slice(loc, &v),
                }),
                IVec2 | BVec2 => value.as_i32s().map(|v| gl.uniform_2_i32_slice(loc, &v)),
                IVec3 | BVec3 => value.as_i32s().map(|v| gl.uniform_3_i32_slice(loc, &v)),
                IVec4 | BVec4 => value.as_i32s().map(|v| gl.uniform_4_i32_slice(loc, &v)),
                Mat2x3 | Mat2x4 | Mat3x2 | Mat3x4 | Mat4x2 | Mat4x3 => None,
                Int | Bool | Sampler2D | Sampler2DShadow | Sampler2DArray | Sampler2DArrayShadow | Sampler3D
                | SamplerCube | SamplerCubeShadow | ISampler2D | ISampler2DArray | ISampler3D | ISamplerCube
                | USampler2D | USampler2DArray | USampler3D | USamplerCube => {
                    value.as_i32s().map(|v| gl.uniform_1_i32_slice(loc, &v))
                }
            }
        };
        if applied.is_none() {
            log::warn!("cannot set {} uniform from {value:?}", ty.glsl_name());
        }
    }

    fn max_vertex_attribs(&self) -> u32 {
        unsafe { self.gl.get_parameter_i32(glow::MAX_VERTEX_ATTRIBS).max(0) as u32 }
    }
}
