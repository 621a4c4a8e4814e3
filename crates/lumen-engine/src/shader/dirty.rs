//! Which units and programs an edit to one fragment invalidates.

use std::collections::{BTreeSet, VecDeque};

use lumen_glsl::{include::direct_includes, SourceRegistry};

use super::compile::ShaderUnit;
use super::{ProgramId, UnitId};
use crate::backend::Backend;
use crate::error::ShaderError;

/// Units to recompile and programs to relink after an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    pub units: BTreeSet<UnitId>,
    pub programs: BTreeSet<ProgramId>,
}

impl DirtySet {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.programs.is_empty()
    }
}

/// True if `edited` is `unit`'s entry fragment or anything it includes.
///
/// Walks the include graph leniently: fragments that are not registered
/// yet contribute no further edges.
pub fn unit_depends_on<B: Backend>(registry: &SourceRegistry, unit: &ShaderUnit<B>, edited: &str) -> bool {
    if unit.uri() == edited {
        return true;
    }

    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<String> = match unit.inline_source() {
        Some(src) => direct_includes(src).into_iter().collect(),
        None => VecDeque::from([unit.uri().to_owned()]),
    };

    while let Some(uri) = queue.pop_front() {
        if uri == edited {
            return true;
        }
        if !seen.insert(uri.clone()) {
            continue;
        }
        if let Ok(deps) = registry.direct_deps(&uri) {
            queue.extend(deps.into_iter().filter(|d| !seen.contains(d)));
        }
    }
    false
}

/// Collects every unit affected by an edit to `edited`, and the programs
/// linked against them.
pub fn find_dirty<B: Backend>(registry: &SourceRegistry, units: &[ShaderUnit<B>], edited: &str) -> DirtySet {
    let mut dirty = DirtySet::default();
    for (i, unit) in units.iter().enumerate() {
        if unit_depends_on(registry, unit, edited) {
            dirty.units.insert(UnitId(i));
            dirty.programs.extend(unit.programs());
        }
    }
    dirty
}

/// Outcome of one recompile pass.
#[derive(Debug, Default)]
pub struct RecompileReport {
    pub recompiled: Vec<UnitId>,
    pub relinked: Vec<ProgramId>,
    /// Programs left on their previous binary because a unit failed.
    pub skipped: Vec<ProgramId>,
    pub errors: Vec<ShaderError>,
}

impl RecompileReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use lumen_glsl::ShaderDefines;

    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::ShaderStage;

    fn unit(uri: &str, inline: Option<&str>, programs: &[usize]) -> ShaderUnit<MockBackend> {
        let mut u = ShaderUnit::new(
            0,
            ShaderStage::Fragment,
            uri.into(),
            ShaderDefines::new(),
            String::new(),
            inline.map(str::to_owned),
        );
        u.programs.extend(programs.iter().map(|&p| ProgramId(p)));
        u
    }

    fn registry() -> SourceRegistry {
        let mut r = SourceRegistry::new();
        r.add_many([
            ("g.glsl", "float g() { return 1.0; }"),
            ("f.glsl", "#include \"g.glsl\"\nfloat f() { return g(); }"),
            ("u.fs", "#include \"f.glsl\"\nvoid main() {}"),
            ("other.fs", "void main() {}"),
        ])
        .unwrap();
        r
    }

    #[test]
    fn transitive_include_marks_unit_and_programs() {
        let units = [unit("u.fs", None, &[0, 2]), unit("other.fs", None, &[1])];
        let dirty = find_dirty(&registry(), &units, "g.glsl");
        assert_eq!(dirty.units, BTreeSet::from([UnitId(0)]));
        assert_eq!(dirty.programs, BTreeSet::from([ProgramId(0), ProgramId(2)]));
    }

    #[test]
    fn inline_units_follow_their_includes() {
        let units = [unit("__anonymous__.fs", Some("#include \"f.glsl\"\nvoid main() {}"), &[])];
        assert!(!find_dirty(&registry(), &units, "g.glsl").units.is_empty());
        assert!(find_dirty(&registry(), &units, "other.fs").is_empty());
    }

    #[test]
    fn unrelated_edit_is_clean() {
        let units = [unit("u.fs", None, &[0])];
        assert!(find_dirty(&registry(), &units, "missing.glsl").is_empty());
    }
}
