//! Program linking: attribute slots, uniform-block bindings, sampler units,
//! and the name-based setters a linked program exposes.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::glsl_type::GlslType;
use super::uniform_block::{BlockLayout, UniformBlock};
use super::value::{BlockValues, UniformValue};
use super::UnitId;
use crate::backend::{ActiveUniform, Backend};
use crate::error::{Result, ShaderError};

/// Explicit sampler → texture unit assignments.
pub type TexUnits = BTreeMap<String, u32>;

// ── context-wide tables ───────────────────────────────────────────────────

/// Vertex attribute slots, allocated by name on first sight and shared by
/// every program of a context.
#[derive(Debug, Default)]
pub struct AttribBindings {
    names: Vec<String>,
}

impl AttribBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn bind(&mut self, name: &str, max: u32) -> Result<u32> {
        if let Some(slot) = self.get(name) {
            return Ok(slot);
        }
        if self.names.len() as u32 >= max {
            let mut bindings = self.names.clone();
            bindings.sort();
            return Err(ShaderError::TooManyAttributes { max, bindings });
        }
        self.names.push(name.to_owned());
        Ok(self.names.len() as u32 - 1)
    }
}

/// Uniform blocks shared by name across programs.
///
/// Binding slot `i` belongs to the `i`-th declared name; the canonical block
/// is created by the first program that links it.
pub struct SharedBlocks<B: Backend> {
    names: Vec<String>,
    blocks: HashMap<String, UniformBlock<B>>,
    warned: HashSet<String>,
}

impl<B: Backend> SharedBlocks<B> {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names.into_iter().map(Into::into) {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self { names: unique, blocks: HashMap::new(), warned: HashSet::new() }
    }

    /// Number of reserved binding slots.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn binding(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }

    /// The canonical block, once some program has linked it.
    pub fn get(&self, name: &str) -> Option<&UniformBlock<B>> {
        self.blocks.get(name)
    }

    /// Packs and uploads into the canonical block `name`.
    pub fn set(&mut self, backend: &B, name: &str, values: &BlockValues<'_>) -> bool {
        match self.blocks.get_mut(name) {
            Some(block) => {
                block.set(backend, values);
                true
            }
            None => {
                if self.warned.insert(name.to_owned()) {
                    log::warn!("shared uniform block {name} is not used by any linked program");
                }
                false
            }
        }
    }
}

// ── program ───────────────────────────────────────────────────────────────

enum BlockSlot<B: Backend> {
    Shared { binding: u32 },
    Private(UniformBlock<B>),
}

struct Setter<B: Backend> {
    ty: GlslType,
    location: B::Location,
}

/// A sampler uniform and the texture unit assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub ty: GlslType,
    pub unit: u32,
}

/// Mutable context state a link reads and extends.
pub(crate) struct LinkEnv<'a, B: Backend> {
    pub backend: &'a B,
    pub attribs: &'a mut AttribBindings,
    pub shared: &'a mut SharedBlocks<B>,
}

/// A linked vertex + fragment pair.
///
/// Units are referenced by id and may be shared with other programs.
/// Relinking happens in place, reusing the program handle and any private
/// uniform buffers.
pub struct ShaderProgram<B: Backend> {
    handle: B::Program,
    vs: UnitId,
    fs: UnitId,
    label: String,
    blocks: BTreeMap<String, BlockSlot<B>>,
    uniforms: HashMap<String, Setter<B>>,
    samplers: Vec<(SamplerBinding, B::Location)>,
    warned: HashSet<String>,
}

impl<B: Backend> ShaderProgram<B> {
    /// `label` identifies the program in logs, e.g. `[quad.vs, blur.fs]`.
    pub(crate) fn new(handle: B::Program, vs: UnitId, fs: UnitId, label: String) -> Self {
        Self {
            handle,
            vs,
            fs,
            label,
            blocks: BTreeMap::new(),
            uniforms: HashMap::new(),
            samplers: Vec::new(),
            warned: HashSet::new(),
        }
    }

    pub fn handle(&self) -> &B::Program {
        &self.handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn vertex_unit(&self) -> UnitId {
        self.vs
    }

    pub fn fragment_unit(&self) -> UnitId {
        self.fs
    }

    pub(crate) fn uses_unit(&self, unit: UnitId) -> bool {
        self.vs == unit || self.fs == unit
    }

    /// Binding slot of uniform block `name`.
    pub fn block_binding(&self, name: &str) -> Option<u32> {
        match self.blocks.get(name)? {
            BlockSlot::Shared { binding } => Some(*binding),
            BlockSlot::Private(block) => Some(block.binding()),
        }
    }

    pub fn is_shared_block(&self, name: &str) -> bool {
        matches!(self.blocks.get(name), Some(BlockSlot::Shared { .. }))
    }

    /// A block owned by this program (not shared).
    pub fn private_block(&self, name: &str) -> Option<&UniformBlock<B>> {
        match self.blocks.get(name)? {
            BlockSlot::Private(block) => Some(block),
            BlockSlot::Shared { .. } => None,
        }
    }

    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    pub fn samplers(&self) -> impl Iterator<Item = &SamplerBinding> {
        self.samplers.iter().map(|(s, _)| s)
    }

    /// Current sampler → unit table, explicit and automatic.
    pub fn texture_units(&self) -> TexUnits {
        self.samplers.iter().map(|(s, _)| (s.name.clone(), s.unit)).collect()
    }

    // ── linking ───────────────────────────────────────────────────────────

    /// Links the attached stages and rebuilds every binding table.
    ///
    /// `tex_units` are reserved before automatic assignment.
    pub(crate) fn link(&mut self, env: LinkEnv<'_, B>, tex_units: &TexUnits) -> Result<()> {
        let LinkEnv { backend, attribs, shared } = env;
        self.link_once(backend)?;

        let attributes = backend.active_attributes(&self.handle);
        if !attributes.is_empty() {
            let max = backend.max_vertex_attribs();
            for name in &attributes {
                let slot = attribs.bind(name, max)?;
                backend.bind_attrib_location(&self.handle, slot, name);
            }
            self.link_once(backend)?;
        }

        let uniforms = backend.active_uniforms(&self.handle);
        self.bind_blocks(backend, shared, &uniforms)?;
        self.bind_uniforms(backend, &uniforms, tex_units);
        Ok(())
    }

    /// Links again, keeping every sampler on the unit it has now.
    pub(crate) fn relink(&mut self, env: LinkEnv<'_, B>) -> Result<()> {
        let units = self.texture_units();
        self.link(env, &units)
    }

    fn link_once(&self, backend: &B) -> Result<()> {
        backend.link_program(&self.handle).map_err(|log| ShaderError::Link {
            program: self.label.clone(),
            log: log.trim_end_matches('\0').to_owned(),
        })
    }

    fn bind_blocks(&mut self, backend: &B, shared: &mut SharedBlocks<B>, uniforms: &[ActiveUniform]) -> Result<()> {
        let mut previous = std::mem::take(&mut self.blocks);
        let mut next = BTreeMap::new();
        let result = self.collect_blocks(backend, shared, uniforms, &mut previous, &mut next);

        // private blocks the new binary no longer declares
        release_private(backend, previous.into_values());
        match result {
            Ok(()) => {
                self.blocks = next;
                Ok(())
            }
            Err(e) => {
                release_private(backend, next.into_values());
                Err(e)
            }
        }
    }

    fn collect_blocks(
        &self,
        backend: &B,
        shared: &mut SharedBlocks<B>,
        uniforms: &[ActiveUniform],
        previous: &mut BTreeMap<String, BlockSlot<B>>,
        next: &mut BTreeMap<String, BlockSlot<B>>,
    ) -> Result<()> {
        let mut next_private = shared.len() as u32;

        for block in backend.active_uniform_blocks(&self.handle) {
            let members = uniforms.iter().filter(|u| u.block_index == Some(block.index));

            let slot = if let Some(binding) = shared.binding(&block.name) {
                match shared.blocks.get(&block.name) {
                    Some(canonical) => {
                        if canonical.layout().size() < block.data_size as usize {
                            log::warn!(
                                "program {} declares shared block {} larger than its canonical layout",
                                self.label,
                                block.name
                            );
                        }
                    }
                    None => {
                        let layout = BlockLayout::from_reflection(&block.name, block.data_size, members)?;
                        let canonical = UniformBlock::new(backend, layout, binding)?;
                        shared.blocks.insert(block.name.clone(), canonical);
                    }
                }
                BlockSlot::Shared { binding }
            } else {
                let binding = next_private;
                next_private += 1;
                let layout = BlockLayout::from_reflection(&block.name, block.data_size, members)?;
                match previous.remove(&block.name) {
                    Some(BlockSlot::Private(mut reused)) => {
                        reused.relayout(layout, binding);
                        BlockSlot::Private(reused)
                    }
                    _ => BlockSlot::Private(UniformBlock::new(backend, layout, binding)?),
                }
            };

            let binding = match &slot {
                BlockSlot::Shared { binding } => *binding,
                BlockSlot::Private(b) => b.binding(),
            };
            backend.uniform_block_binding(&self.handle, block.index, binding);
            next.insert(block.name, slot);
        }
        Ok(())
    }

    fn bind_uniforms(&mut self, backend: &B, uniforms: &[ActiveUniform], tex_units: &TexUnits) {
        self.uniforms.clear();
        self.samplers.clear();

        let reserved: BTreeSet<u32> = tex_units.values().copied().collect();
        let mut next_unit = 0;

        for u in uniforms.iter().filter(|u| u.block_index.is_none()) {
            let name = u.name.strip_suffix("[0]").unwrap_or(&u.name);
            let Some(ty) = GlslType::from_gl(u.gl_type) else {
                log::warn!("program {}: uniform {name} has unsupported type 0x{:04X}", self.label, u.gl_type);
                continue;
            };
            if ty.is_non_square_matrix() {
                log::warn!("program {}: skipping {} uniform {name}", self.label, ty.glsl_name());
                continue;
            }
            let Some(location) = backend.uniform_location(&self.handle, name) else {
                continue;
            };

            if ty.is_sampler() {
                let unit = match tex_units.get(name) {
                    Some(&unit) => unit,
                    None => {
                        while reserved.contains(&next_unit) {
                            next_unit += 1;
                        }
                        let unit = next_unit;
                        next_unit += 1;
                        unit
                    }
                };
                let binding = SamplerBinding { name: name.to_owned(), ty, unit };
                self.samplers.push((binding, location));
            } else {
                self.uniforms.insert(name.to_owned(), Setter { ty, location });
            }
        }

        if !self.samplers.is_empty() {
            backend.use_program(&self.handle);
            for (sampler, location) in &self.samplers {
                backend.set_uniform(location, sampler.ty, &UniformValue::Int(sampler.unit as i32));
            }
        }
    }

    // ── setters ───────────────────────────────────────────────────────────

    fn warn_once(&mut self, kind: &str, name: &str) {
        if self.warned.insert(format!("{kind} {name}")) {
            log::warn!("shader program {} has no {kind} {name}", self.label);
        }
    }

    /// Sets a plain uniform. The program must be current on the backend.
    pub(crate) fn set_uniform(&mut self, backend: &B, name: &str, value: &UniformValue<'_>) -> bool {
        match self.uniforms.get(name) {
            Some(setter) => {
                backend.set_uniform(&setter.location, setter.ty, value);
                true
            }
            None => {
                self.warn_once("uniform", name);
                false
            }
        }
    }

    /// Packs and uploads a block, routing shared names to the canonical block.
    pub(crate) fn set_uniform_block(
        &mut self,
        backend: &B,
        shared: &mut SharedBlocks<B>,
        name: &str,
        values: &BlockValues<'_>,
    ) -> bool {
        match self.blocks.get_mut(name) {
            Some(BlockSlot::Private(block)) => {
                block.set(backend, values);
                true
            }
            Some(BlockSlot::Shared { .. }) => shared.set(backend, name, values),
            None => {
                self.warn_once("uniform block", name);
                false
            }
        }
    }

    pub(crate) fn texture_unit(&mut self, name: &str) -> Option<u32> {
        let unit = self.samplers.iter().find(|(s, _)| s.name == name).map(|(s, _)| s.unit);
        if unit.is_none() {
            self.warn_once("sampler", name);
        }
        unit
    }

    /// Deletes the program object and its private block buffers.
    pub(crate) fn release(self, backend: &B) {
        backend.delete_program(&self.handle);
        release_private(backend, self.blocks.into_values());
    }

    /// Rebinds private block buffers to their slots; slots are numbered per
    /// program, so another program may have taken them since.
    pub(crate) fn bind_private_blocks(&self, backend: &B) {
        for slot in self.blocks.values() {
            if let BlockSlot::Private(block) = slot {
                block.bind(backend);
            }
        }
    }
}

fn release_private<B: Backend>(backend: &B, slots: impl IntoIterator<Item = BlockSlot<B>>) {
    for slot in slots {
        if let BlockSlot::Private(block) = slot {
            block.release(backend);
        }
    }
}
