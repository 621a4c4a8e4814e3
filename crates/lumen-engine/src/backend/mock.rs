//! Scripted backend for unit tests.
//!
//! "Compiles" GLSL by scanning declarations line by line:
//! - `#error <msg>` fails compilation with `ERROR: 0:<line>: <msg>`
//! - `in <type> <name>;` in a vertex stage declares an attribute
//! - `uniform <type> <name>;` / `uniform <type> <name>[N];` declares a plain uniform
//! - `uniform <Block> {` ... `};` declares a block; members get std140 offsets
//! - a `// link-error` line anywhere makes linking fail
//!
//! Every call is appended to a log so tests can assert on ordering.

use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, HashMap};

use super::{ActiveUniform, ActiveUniformBlock, Backend, ShaderStage};
use crate::shader::{GlslType, Scalar, UniformValue};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Compile(u32),
    Link(u32),
    BindAttrib { program: u32, index: u32, name: String },
    BlockBinding { program: u32, block_index: u32, binding: u32 },
    Upload { buffer: u32, binding: u32 },
    BindBuffer { buffer: u32, binding: u32 },
    UseProgram(u32),
    SetUniform { program: u32, name: String, values: Vec<f32> },
}

#[derive(Default)]
struct MockShader {
    stage: Option<ShaderStage>,
    source: String,
    compiled: bool,
}

#[derive(Default)]
struct MockProgram {
    attached: Vec<u32>,
    attributes: Vec<String>,
    blocks: Vec<ActiveUniformBlock>,
    uniforms: Vec<ActiveUniform>,
}

#[derive(Default)]
struct State {
    next_id: u32,
    shaders: HashMap<u32, MockShader>,
    programs: HashMap<u32, MockProgram>,
    buffers: HashMap<u32, Vec<u8>>,
    bindings: BTreeMap<u32, u32>,
    calls: Vec<Call>,
}

impl State {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

pub(crate) struct MockBackend {
    state: RefCell<State>,
    max_attribs: u32,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self { state: RefCell::new(State::default()), max_attribs: 16 }
    }

    pub(crate) fn with_max_attribs(max_attribs: u32) -> Self {
        Self { max_attribs, ..Self::new() }
    }

    pub(crate) fn calls(&self) -> Ref<'_, Vec<Call>> {
        Ref::map(self.state.borrow(), |s| &s.calls)
    }

    pub(crate) fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Contents of the buffer last bound to uniform-buffer slot `binding`.
    pub(crate) fn bound_block_data(&self, binding: u32) -> Option<Vec<u8>> {
        let state = self.state.borrow();
        let buffer = state.bindings.get(&binding)?;
        state.buffers.get(buffer).cloned()
    }

    pub(crate) fn shader_source(&self, shader: u32) -> Option<String> {
        self.state.borrow().shaders.get(&shader).map(|s| s.source.clone())
    }

    pub(crate) fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub(crate) fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }
}

impl Backend for MockBackend {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Location = (u32, String);

    fn create_shader_stage(&self, stage: ShaderStage) -> anyhow::Result<u32> {
        let mut state = self.state.borrow_mut();
        let id = state.next();
        state.shaders.insert(id, MockShader { stage: Some(stage), ..MockShader::default() });
        Ok(id)
    }

    fn delete_shader_stage(&self, shader: &u32) {
        self.state.borrow_mut().shaders.remove(shader);
    }

    fn compile_shader_stage(&self, shader: &u32, source: &str) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Compile(*shader));

        let mut log = String::new();
        for (i, line) in source.lines().enumerate() {
            if let Some(msg) = line.trim().strip_prefix("#error") {
                log.push_str(&format!("ERROR: 0:{}: {}\n", i + 1, msg.trim()));
            }
        }

        let entry = state.shaders.entry(*shader).or_default();
        entry.source = source.to_owned();
        entry.compiled = log.is_empty();
        if log.is_empty() {
            Ok(())
        } else {
            log.push('\0');
            Err(log)
        }
    }

    fn create_program(&self) -> anyhow::Result<u32> {
        let mut state = self.state.borrow_mut();
        let id = state.next();
        state.programs.insert(id, MockProgram::default());
        Ok(id)
    }

    fn delete_program(&self, program: &u32) {
        self.state.borrow_mut().programs.remove(program);
    }

    fn attach_stage(&self, program: &u32, shader: &u32) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(program) {
            p.attached.push(*shader);
        }
    }

    fn link_program(&self, program: &u32) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Link(*program));

        let attached = state.programs.get(program).map(|p| p.attached.clone()).unwrap_or_default();
        let mut reflection = Reflection::default();
        for id in &attached {
            let Some(shader) = state.shaders.get(id) else {
                return Err(format!("error: shader {id} was deleted"));
            };
            if !shader.compiled {
                return Err(format!("error: shader {id} is not compiled"));
            }
            if shader.source.contains("// link-error") {
                return Err("error: linking failed".to_owned());
            }
            reflection.scan(&shader.source, shader.stage == Some(ShaderStage::Vertex));
        }

        if let Some(p) = state.programs.get_mut(program) {
            p.attributes = reflection.attributes;
            p.blocks = reflection.blocks;
            p.uniforms = reflection.uniforms;
        }
        Ok(())
    }

    fn active_attributes(&self, program: &u32) -> Vec<String> {
        self.state.borrow().programs.get(program).map(|p| p.attributes.clone()).unwrap_or_default()
    }

    fn active_uniform_blocks(&self, program: &u32) -> Vec<ActiveUniformBlock> {
        self.state.borrow().programs.get(program).map(|p| p.blocks.clone()).unwrap_or_default()
    }

    fn active_uniforms(&self, program: &u32) -> Vec<ActiveUniform> {
        self.state.borrow().programs.get(program).map(|p| p.uniforms.clone()).unwrap_or_default()
    }

    fn bind_attrib_location(&self, program: &u32, index: u32, name: &str) {
        self.state.borrow_mut().calls.push(Call::BindAttrib { program: *program, index, name: name.to_owned() });
    }

    fn uniform_block_binding(&self, program: &u32, block_index: u32, binding: u32) {
        self.state.borrow_mut().calls.push(Call::BlockBinding { program: *program, block_index, binding });
    }

    fn uniform_location(&self, program: &u32, name: &str) -> Option<(u32, String)> {
        let state = self.state.borrow();
        let p = state.programs.get(program)?;
        p.uniforms
            .iter()
            .find(|u| u.block_index.is_none() && (u.name == name || u.name.strip_suffix("[0]") == Some(name)))
            .map(|_| (*program, name.to_owned()))
    }

    fn create_buffer(&self) -> anyhow::Result<u32> {
        let mut state = self.state.borrow_mut();
        let id = state.next();
        state.buffers.insert(id, Vec::new());
        Ok(id)
    }

    fn upload_uniform_buffer(&self, buffer: &u32, binding: u32, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Upload { buffer: *buffer, binding });
        state.buffers.insert(*buffer, data.to_vec());
        state.bindings.insert(binding, *buffer);
    }

    fn bind_uniform_buffer(&self, buffer: &u32, binding: u32) {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::BindBuffer { buffer: *buffer, binding });
        state.bindings.insert(binding, *buffer);
    }

    fn delete_buffer(&self, buffer: &u32) {
        let mut state = self.state.borrow_mut();
        state.buffers.remove(buffer);
        state.bindings.retain(|_, b| *b != *buffer);
    }

    fn use_program(&self, program: &u32) {
        self.state.borrow_mut().calls.push(Call::UseProgram(*program));
    }

    fn set_uniform(&self, location: &(u32, String), _ty: GlslType, value: &UniformValue<'_>) {
        let values = (0..value.len()).filter_map(|i| value.scalar(i)).map(Scalar::to_f32).collect();
        self.state.borrow_mut().calls.push(Call::SetUniform {
            program: location.0,
            name: location.1.clone(),
            values,
        });
    }

    fn max_vertex_attribs(&self) -> u32 {
        self.max_attribs
    }
}

// ── reflection ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Reflection {
    attributes: Vec<String>,
    blocks: Vec<ActiveUniformBlock>,
    uniforms: Vec<ActiveUniform>,
}

struct OpenBlock {
    name: String,
    members: Vec<(GlslType, String, u32)>,
}

impl Reflection {
    fn scan(&mut self, source: &str, vertex: bool) {
        let mut open: Option<OpenBlock> = None;

        for line in source.lines().map(str::trim) {
            if open.is_some() {
                if let Some(rest) = line.strip_prefix('}') {
                    let instance = rest.trim().trim_end_matches(';').trim();
                    if let Some(block) = open.take() {
                        self.close_block(block, !instance.is_empty());
                    }
                } else if let (Some(block), Some(member)) = (open.as_mut(), declaration(line)) {
                    block.members.push(member);
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix("uniform ") {
                if let Some(name) = rest.strip_suffix('{') {
                    open = Some(OpenBlock { name: name.trim().to_owned(), members: Vec::new() });
                } else if let Some((ty, name, len)) = declaration(rest) {
                    self.add_uniform(ty, name, len, None, None);
                }
            } else if vertex {
                if let Some((_, name, _)) = line.strip_prefix("in ").and_then(declaration) {
                    if !self.attributes.contains(&name) {
                        self.attributes.push(name);
                    }
                }
            }
        }
    }

    fn close_block(&mut self, block: OpenBlock, prefixed: bool) {
        if self.blocks.iter().any(|b| b.name == block.name) {
            return;
        }
        let index = self.blocks.len() as u32;
        let mut offset = 0u32;
        for (ty, name, len) in block.members {
            let (align, size) = std140(ty, len);
            offset = offset.next_multiple_of(align);
            let name = if prefixed { format!("{}.{name}", block.name) } else { name };
            self.add_uniform(ty, name, len, Some(index), Some(offset));
            offset += size;
        }
        self.blocks.push(ActiveUniformBlock { index, name: block.name, data_size: offset.next_multiple_of(16) });
    }

    fn add_uniform(&mut self, ty: GlslType, name: String, len: u32, block_index: Option<u32>, offset: Option<u32>) {
        let name = if len > 1 { format!("{name}[0]") } else { name };
        if self.uniforms.iter().any(|u| u.name == name) {
            return;
        }
        self.uniforms.push(ActiveUniform { name, gl_type: ty.to_gl(), size: len, block_index, offset });
    }
}

/// Parses `<type> <name>;` or `<type> <name>[N];`.
fn declaration(line: &str) -> Option<(GlslType, String, u32)> {
    let line = line.strip_prefix("highp ").unwrap_or(line);
    let (ty, rest) = line.split_once(' ')?;
    let ty = GlslType::from_glsl(ty)?;
    let decl = rest.trim().strip_suffix(';')?;
    match decl.split_once('[') {
        Some((name, len)) => Some((ty, name.to_owned(), len.strip_suffix(']')?.parse().ok()?)),
        None => Some((ty, decl.to_owned(), 1)),
    }
}

/// (base alignment, size) in bytes under std140.
fn std140(ty: GlslType, len: u32) -> (u32, u32) {
    let Some(shape) = ty.block_shape() else {
        return (16, 16);
    };
    let (components, rows) = (shape.components as u32, shape.rows_per_element as u32);
    if len > 1 || rows > 1 {
        return (16, 16 * rows * len);
    }
    match components {
        1 => (4, 4),
        2 => (8, 8),
        3 => (16, 12),
        _ => (16, 16),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_std140_offsets() {
        let mut r = Reflection::default();
        r.scan("uniform Params {\n  float a;\n  vec3 b;\n  float c;\n  vec2 d[2];\n};", false);
        let offsets: Vec<_> = r.uniforms.iter().map(|u| (u.name.as_str(), u.offset)).collect();
        assert_eq!(
            offsets,
            [("a", Some(0)), ("b", Some(16)), ("c", Some(28)), ("d[0]", Some(32))]
        );
        assert_eq!(r.blocks[0].data_size, 64);
    }

    #[test]
    fn instance_name_prefixes_members() {
        let mut r = Reflection::default();
        r.scan("uniform Camera {\n  mat4 view;\n} camera;", false);
        assert_eq!(r.uniforms[0].name, "Camera.view");
    }

    #[test]
    fn error_directive_fails_compile() {
        let mock = MockBackend::new();
        let shader = mock.create_shader_stage(ShaderStage::Fragment).unwrap();
        let log = mock.compile_shader_stage(&shader, "void main() {}\n#error nope").unwrap_err();
        assert_eq!(log, "ERROR: 0:2: nope\n\0");
    }
}
