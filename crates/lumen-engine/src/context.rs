use std::collections::{BTreeSet, HashMap};

use lumen_glsl::{include::direct_includes, instance_key, DefineValue, ShaderDefines, SourceFetcher, SourceRegistry};

use crate::backend::{Backend, ShaderStage};
use crate::error::{Result, ShaderError};
use crate::shader::{
    find_dirty, AttribBindings, BlockValues, LinkEnv, ProgramId, RecompileReport, ShaderProgram, ShaderUnit,
    SharedBlocks, TexUnits, UniformBlock, UniformValue, UnitId,
};

/// Preamble for GLSL ES 3.00 / WebGL2 with std140 column-major blocks.
pub const DEFAULT_PREAMBLE: &str =
    "#version 300 es\nprecision highp float;\nprecision highp int;\nlayout(std140, column_major) uniform;\n";

/// Context-wide configuration.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Uniform block names shared by every program; they take binding
    /// slots `0..N` in this order.
    pub shared_uniform_blocks: Vec<String>,
    /// Preamble used when a [`ShaderDef`] does not carry its own.
    pub default_preamble: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            shared_uniform_blocks: Vec::new(),
            default_preamble: DEFAULT_PREAMBLE.to_owned(),
        }
    }
}

/// What to compile for one stage.
///
/// Either `uri` names a registered fragment, or `src` holds the entry text
/// directly (its includes still come from the registry).
#[derive(Debug, Clone, Default)]
pub struct ShaderDef {
    pub uri: Option<String>,
    pub src: Option<String>,
    pub defines: ShaderDefines,
    pub preamble: Option<String>,
}

impl ShaderDef {
    pub fn uri(uri: impl Into<String>) -> Self {
        Self { uri: Some(uri.into()), ..Self::default() }
    }

    pub fn source(src: impl Into<String>) -> Self {
        Self { src: Some(src.into()), ..Self::default() }
    }

    pub fn define(mut self, name: impl Into<String>, value: impl Into<DefineValue>) -> Self {
        self.defines.insert(name, value);
        self
    }

    pub fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }
}

/// A program to build in a batch.
#[derive(Debug, Clone, Default)]
pub struct ProgramDef {
    pub vs: ShaderDef,
    pub fs: ShaderDef,
    pub tex_units: TexUnits,
}

/// Owns the source registry, every compiled unit and program, and the
/// context-wide attribute and shared-block tables.
///
/// Units live as long as the context. Programs can be deleted; their ids
/// are not reused.
pub struct ShaderContext<B: Backend> {
    backend: B,
    registry: SourceRegistry,
    options: ContextOptions,

    units: Vec<ShaderUnit<B>>,
    instances: HashMap<(ShaderStage, String), UnitId>,
    programs: Vec<Option<ShaderProgram<B>>>,

    attribs: AttribBindings,
    shared_blocks: SharedBlocks<B>,
    current: Option<ProgramId>,
}

impl<B: Backend> ShaderContext<B> {
    pub fn new(backend: B, options: ContextOptions) -> Self {
        let shared_blocks = SharedBlocks::new(options.shared_uniform_blocks.iter().cloned());
        Self {
            backend,
            registry: SourceRegistry::new(),
            options,
            units: Vec::new(),
            instances: HashMap::new(),
            programs: Vec::new(),
            attribs: AttribBindings::new(),
            shared_blocks,
            current: None,
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Direct registry access. Edits made here are not recompiled until
    /// [`recompile_dirty`](Self::recompile_dirty) runs.
    pub fn registry_mut(&mut self) -> &mut SourceRegistry {
        &mut self.registry
    }

    pub fn unit(&self, id: UnitId) -> Option<&ShaderUnit<B>> {
        self.units.get(id.0)
    }

    pub fn program(&self, id: ProgramId) -> Option<&ShaderProgram<B>> {
        self.programs.get(id.0)?.as_ref()
    }

    /// The canonical instance of shared block `name`, once linked.
    pub fn shared_uniform_block(&self, name: &str) -> Option<&UniformBlock<B>> {
        self.shared_blocks.get(name)
    }

    pub fn attribute_binding(&self, name: &str) -> Option<u32> {
        self.attribs.get(name)
    }

    // ── building ──────────────────────────────────────────────────────────

    /// Compiles one stage, or returns the cached unit for the same URI,
    /// preamble, and define set. Inline sources are never cached.
    pub fn compile_shader(&mut self, def: &ShaderDef, stage: ShaderStage) -> Result<UnitId> {
        let preamble = def.preamble.clone().unwrap_or_else(|| self.options.default_preamble.clone());

        let (uri, inline_src, key) = match (&def.uri, &def.src) {
            (_, Some(src)) => {
                let uri = def.uri.clone().unwrap_or_else(|| format!("__anonymous__.{}", stage.extension()));
                (uri, Some(src.clone()), None)
            }
            (Some(uri), None) => {
                let key = instance_key(uri, &preamble, &def.defines);
                if let Some(&id) = self.instances.get(&(stage, key.clone())) {
                    return Ok(id);
                }
                (uri.clone(), None, Some(key))
            }
            (None, None) => return Err(ShaderError::MissingSource),
        };

        let handle = self.backend.create_shader_stage(stage)?;
        let unit = ShaderUnit::new(handle, stage, uri, def.defines.clone(), preamble, inline_src);

        let built = unit
            .preprocess(&self.registry)
            .map_err(ShaderError::from)
            .and_then(|pre| unit.compile(&self.backend, &pre).map_err(ShaderError::from));
        if let Err(e) = built {
            self.backend.delete_shader_stage(unit.handle());
            return Err(e);
        }

        let id = UnitId(self.units.len());
        log::debug!("compiled {} as unit {}", unit.uri(), id.0);
        self.units.push(unit);
        if let Some(key) = key {
            self.instances.insert((stage, key), id);
        }
        Ok(id)
    }

    /// Compiles (or reuses) both stages and links them.
    pub fn new_program(&mut self, vs: &ShaderDef, fs: &ShaderDef, tex_units: &TexUnits) -> Result<ProgramId> {
        let vs_id = self.compile_shader(vs, ShaderStage::Vertex)?;
        let fs_id = self.compile_shader(fs, ShaderStage::Fragment)?;

        let handle = self.backend.create_program()?;
        self.backend.attach_stage(&handle, &self.units[vs_id.0].handle);
        self.backend.attach_stage(&handle, &self.units[fs_id.0].handle);

        let label = format!("[{}, {}]", self.units[vs_id.0].uri(), self.units[fs_id.0].uri());
        let mut program = ShaderProgram::new(handle, vs_id, fs_id, label);

        let env = LinkEnv { backend: &self.backend, attribs: &mut self.attribs, shared: &mut self.shared_blocks };
        let linked = program.link(env, tex_units);
        // sampler setup leaves the new program bound
        self.current = None;
        if let Err(e) = linked {
            program.release(&self.backend);
            return Err(e);
        }

        let id = ProgramId(self.programs.len());
        self.units[vs_id.0].programs.insert(id);
        self.units[fs_id.0].programs.insert(id);
        self.programs.push(Some(program));
        Ok(id)
    }

    pub fn new_programs(&mut self, defs: &[ProgramDef]) -> Result<Vec<ProgramId>> {
        defs.iter().map(|d| self.new_program(&d.vs, &d.fs, &d.tex_units)).collect()
    }

    /// Fetches every fragment the definitions reach, then builds them.
    pub async fn new_programs_async<F>(&mut self, fetcher: &F, defs: &[ProgramDef]) -> Result<Vec<ProgramId>>
    where
        F: SourceFetcher + ?Sized,
    {
        let mut uris = BTreeSet::new();
        for def in defs.iter().flat_map(|d| [&d.vs, &d.fs]) {
            match (&def.src, &def.uri) {
                (Some(src), _) => uris.extend(direct_includes(src)),
                (None, Some(uri)) => {
                    uris.insert(uri.clone());
                }
                (None, None) => {}
            }
        }
        self.registry.fetch(fetcher, &uris).await?;
        self.new_programs(defs)
    }

    /// Deletes a program and detaches it from its units.
    pub fn delete_program(&mut self, id: ProgramId) -> bool {
        let Some(program) = self.programs.get_mut(id.0).and_then(Option::take) else {
            return false;
        };
        for unit in [program.vertex_unit(), program.fragment_unit()] {
            self.units[unit.0].programs.remove(&id);
        }
        program.release(&self.backend);
        if self.current == Some(id) {
            self.current = None;
        }
        true
    }

    // ── live edit ─────────────────────────────────────────────────────────

    /// Replaces a registered fragment and rebuilds whatever depends on it.
    pub fn update_source(&mut self, uri: &str, text: impl Into<String>) -> Result<RecompileReport> {
        self.registry.replace(uri, text)?;
        Ok(self.recompile_dirty(uri))
    }

    /// Recompiles every unit reaching `uri`, then relinks their programs.
    ///
    /// All units compile before any program links. A unit that fails keeps
    /// its handle and its programs are left on their last linked binary;
    /// other units and programs still rebuild. A program the driver fails to
    /// relink keeps its previous tables. Any link forgets the current program.
    pub fn recompile_dirty(&mut self, uri: &str) -> RecompileReport {
        let dirty = find_dirty(&self.registry, &self.units, uri);
        let mut report = RecompileReport::default();
        let mut failed = BTreeSet::new();

        for &id in &dirty.units {
            let unit = &self.units[id.0];
            log::info!("recompiling {}", unit.uri());
            let built = unit
                .preprocess(&self.registry)
                .map_err(ShaderError::from)
                .and_then(|pre| unit.compile(&self.backend, &pre).map_err(ShaderError::from));
            match built {
                Ok(()) => report.recompiled.push(id),
                Err(e) => {
                    failed.insert(id);
                    report.errors.push(e);
                }
            }
        }

        for &id in &dirty.programs {
            let Some(program) = self.programs.get_mut(id.0).and_then(Option::as_mut) else {
                continue;
            };
            if failed.contains(&program.vertex_unit()) || failed.contains(&program.fragment_unit()) {
                log::debug!("not relinking {}: a unit failed to compile", program.label());
                report.skipped.push(id);
                continue;
            }
            log::info!("relinking {}", program.label());
            let env = LinkEnv { backend: &self.backend, attribs: &mut self.attribs, shared: &mut self.shared_blocks };
            let relinked = program.relink(env);
            self.current = None;
            match relinked {
                Ok(()) => report.relinked.push(id),
                Err(e) => report.errors.push(e),
            }
        }
        report
    }

    // ── drawing state ─────────────────────────────────────────────────────

    /// Makes `id` current and rebinds its private uniform buffers.
    pub fn use_program(&mut self, id: ProgramId) -> bool {
        let Some(program) = self.program(id) else {
            log::warn!("use_program: no program {}", id.0);
            return false;
        };
        self.backend.use_program(program.handle());
        program.bind_private_blocks(&self.backend);
        self.current = Some(id);
        true
    }

    /// Sets a plain uniform on `id`, making it current first if needed.
    pub fn set_uniform<'a>(&mut self, id: ProgramId, name: &str, value: impl Into<UniformValue<'a>>) -> bool {
        if self.current != Some(id) && !self.use_program(id) {
            return false;
        }
        match self.programs.get_mut(id.0).and_then(Option::as_mut) {
            Some(program) => program.set_uniform(&self.backend, name, &value.into()),
            None => false,
        }
    }

    /// Packs and uploads block `name` of program `id`. Shared names write
    /// the canonical block seen by every program.
    pub fn set_uniform_block(&mut self, id: ProgramId, name: &str, values: &BlockValues<'_>) -> bool {
        match self.programs.get_mut(id.0).and_then(Option::as_mut) {
            Some(program) => program.set_uniform_block(&self.backend, &mut self.shared_blocks, name, values),
            None => false,
        }
    }

    pub fn set_shared_uniform_block(&mut self, name: &str, values: &BlockValues<'_>) -> bool {
        self.shared_blocks.set(&self.backend, name, values)
    }

    /// Texture unit of sampler `name` in program `id`.
    pub fn texture_unit(&mut self, id: ProgramId, name: &str) -> Option<u32> {
        self.programs.get_mut(id.0)?.as_mut()?.texture_unit(name)
    }
}
