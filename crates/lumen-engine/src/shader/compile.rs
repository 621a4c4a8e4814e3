//! Compile units and compiler-log mapping.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use lumen_glsl::{
    preprocess, preprocess_source, PreprocessedSource, ShaderDefines, SourceError, SourceLocation, SourceMap,
    SourceRegistry,
};

use super::ProgramId;
use crate::backend::{Backend, ShaderStage};

// ── diagnostics ───────────────────────────────────────────────────────────

/// One compiler message, mapped back to the fragment it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// `None` when the driver gave no line, or a line outside the source.
    pub location: Option<SourceLocation>,
    /// All log lines reported for this location, joined with `\n`.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}:{}: {}", loc.uri, loc.line, self.message),
            None => write!(f, "<unknown>: {}", self.message),
        }
    }
}

/// A failed compile, with the raw driver log and its mapped diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Entry URI of the unit that failed.
    pub uri: String,
    pub raw_log: String,
    /// In compiler line order; unlocated messages first.
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to compile {}", self.uri)?;
        for d in &self.diagnostics {
            write!(f, "\n  {d}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Extracts the flattened line from `ERROR: <n>:<line>: <message>`.
fn parse_error_line(line: &str) -> Option<(usize, &str)> {
    let start = line.find("ERROR: ")? + "ERROR: ".len();
    let (file, rest) = line[start..].split_once(':')?;
    if file.is_empty() || !file.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (flat_line, message) = rest.split_once(": ")?;
    Some((flat_line.parse().ok()?, message))
}

/// Groups a compiler log by flattened line and maps each group through `map`.
///
/// Groups stay in flattened-line order: origin lines from different
/// fragments do not compare.
///
/// Lines without a recognisable line number continue the previous message
/// (or start an unlocated one).
pub fn parse_compile_log(log: &str, map: &SourceMap) -> Vec<Diagnostic> {
    let mut groups: BTreeMap<Option<usize>, Vec<&str>> = BTreeMap::new();
    let mut current = None;

    for line in log.trim_end_matches('\0').lines() {
        if line.trim().is_empty() {
            continue;
        }
        let message = match parse_error_line(line) {
            Some((flat, msg)) => {
                current = Some(flat);
                msg
            }
            None => line,
        };
        groups.entry(current).or_default().push(message);
    }

    groups
        .into_iter()
        .map(|(flat, messages)| Diagnostic {
            location: flat.and_then(|l| map.locate(l)),
            message: messages.join("\n"),
        })
        .collect()
}

// ── compile unit ──────────────────────────────────────────────────────────

/// One compiled shader stage.
///
/// The stage handle is created once and recompiled in place. `programs`
/// records which programs link against this unit, for dirty propagation.
pub struct ShaderUnit<B: Backend> {
    pub(crate) handle: B::Shader,
    stage: ShaderStage,
    uri: String,
    defines: ShaderDefines,
    preamble: String,
    inline_src: Option<String>,
    pub(crate) programs: BTreeSet<ProgramId>,
}

impl<B: Backend> ShaderUnit<B> {
    pub(crate) fn new(
        handle: B::Shader,
        stage: ShaderStage,
        uri: String,
        defines: ShaderDefines,
        preamble: String,
        inline_src: Option<String>,
    ) -> Self {
        Self { handle, stage, uri, defines, preamble, inline_src, programs: BTreeSet::new() }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn defines(&self) -> &ShaderDefines {
        &self.defines
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Entry text for units created from a string rather than a registered URI.
    pub fn inline_source(&self) -> Option<&str> {
        self.inline_src.as_deref()
    }

    pub fn programs(&self) -> impl Iterator<Item = ProgramId> + '_ {
        self.programs.iter().copied()
    }

    pub fn handle(&self) -> &B::Shader {
        &self.handle
    }

    /// Flattens the unit's current source from `registry`.
    pub fn preprocess(&self, registry: &SourceRegistry) -> Result<PreprocessedSource, SourceError> {
        match &self.inline_src {
            Some(src) => preprocess_source(registry, &self.uri, src, &self.defines, &self.preamble),
            None => preprocess(registry, &self.uri, &self.defines, &self.preamble),
        }
    }

    /// Submits flattened source to the backend compiler.
    pub fn compile(&self, backend: &B, source: &PreprocessedSource) -> Result<(), CompileError> {
        backend.compile_shader_stage(&self.handle, &source.source).map_err(|raw_log| {
            log::warn!("failed to compile {}:\n{}", self.uri, raw_log.trim_end_matches('\0'));
            CompileError {
                uri: self.uri.clone(),
                diagnostics: parse_compile_log(&raw_log, &source.source_map),
                raw_log,
            }
        })
    }
}
