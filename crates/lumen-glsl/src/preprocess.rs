//! Flattening of a fragment and its `#include`s into one compilable string.

use crate::defines::ShaderDefines;
use crate::error::SourceError;
use crate::include::{line_runs, LineRun};
use crate::registry::SourceRegistry;
use crate::source_map::{SourceMap, DEFINES_URI, PREAMBLE_URI};

/// Flattened shader text plus the map from its lines back to their origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedSource {
    pub source: String,
    pub source_map: SourceMap,
}

/// Expands the registered fragment `uri`.
///
/// Output layout: preamble lines, one `#define` per entry of `defines`
/// (sorted by name), then the fragment with every include spliced in place.
pub fn preprocess(
    registry: &SourceRegistry,
    uri: &str,
    defines: &ShaderDefines,
    preamble: &str,
) -> Result<PreprocessedSource, SourceError> {
    let src = registry.get(uri)?;
    preprocess_source(registry, uri, src, defines, preamble)
}

/// Like [`preprocess`], for entry text that is not (or not yet) registered.
///
/// Includes are still resolved through `registry`.
pub fn preprocess_source(
    registry: &SourceRegistry,
    uri: &str,
    src: &str,
    defines: &ShaderDefines,
    preamble: &str,
) -> Result<PreprocessedSource, SourceError> {
    let mut flat = Flattener::new(registry);

    let preamble_lines: Vec<&str> = preamble.split('\n').collect();
    flat.push_lines(&preamble_lines);
    flat.map.append(PREAMBLE_URI, 1, preamble_lines.len());

    let define_lines = defines.to_lines();
    flat.push_lines(&define_lines);
    flat.map.append(DEFINES_URI, 1, define_lines.len());

    flat.stack.push(uri.to_owned());
    flat.expand(uri, src)?;
    flat.stack.pop();

    Ok(PreprocessedSource { source: flat.out, source_map: flat.map })
}

struct Flattener<'r> {
    registry: &'r SourceRegistry,
    out: String,
    lines_written: usize,
    map: SourceMap,
    /// Fragments currently being expanded, outermost first.
    stack: Vec<String>,
}

impl<'r> Flattener<'r> {
    fn new(registry: &'r SourceRegistry) -> Self {
        Self {
            registry,
            out: String::new(),
            lines_written: 0,
            map: SourceMap::new(),
            stack: Vec::new(),
        }
    }

    fn push_lines<S: AsRef<str>>(&mut self, lines: &[S]) {
        for line in lines {
            if self.lines_written > 0 {
                self.out.push('\n');
            }
            self.out.push_str(line.as_ref());
            self.lines_written += 1;
        }
    }

    fn expand(&mut self, uri: &str, src: &str) -> Result<(), SourceError> {
        let mut line_num = 1;
        for run in line_runs(src) {
            match &run {
                LineRun::Include(paths) => {
                    for &include in paths {
                        if self.stack.iter().any(|open| open == include) {
                            let mut chain = self.stack.clone();
                            chain.push(include.to_owned());
                            return Err(SourceError::CircularInclude { chain });
                        }
                        let registry = self.registry;
                        let text = registry.get(include)?;
                        self.stack.push(include.to_owned());
                        self.expand(include, text)?;
                        self.stack.pop();
                    }
                }
                LineRun::Source(lines) => {
                    self.push_lines(lines);
                    self.map.append(uri, line_num, lines.len());
                }
            }
            line_num += run.line_count();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &str = "#version 300 es\nprecision highp float;\nprecision highp int;\nlayout(std140) uniform;\n// preamble";

    fn registry() -> SourceRegistry {
        let mut r = SourceRegistry::new();
        r.add_many([
            ("main.fs", "out vec4 color;\n#include \"lib.glsl\"\nvoid main() {\n  color = shade();\n}"),
            ("lib.glsl", "#include \"math.glsl\"\nvec4 shade() {\n  return vec4(sq(0.5));\n}"),
            ("math.glsl", "float sq(float x) { return x * x; }"),
        ])
        .unwrap();
        r
    }

    #[test]
    fn splices_includes_in_place() {
        let pp = preprocess(&registry(), "main.fs", &ShaderDefines::new(), "#version 300 es").unwrap();
        assert_eq!(
            pp.source,
            "#version 300 es\nout vec4 color;\nfloat sq(float x) { return x * x; }\nvec4 shade() {\n  return vec4(sq(0.5));\n}\nvoid main() {\n  color = shade();\n}"
        );
        assert_eq!(pp.source_map.line_count(), pp.source.split('\n').count());
    }

    #[test]
    fn defines_follow_preamble_sorted() {
        let defines = ShaderDefines::new().with("B", 2).with("A", 1);
        let pp = preprocess(&registry(), "math.glsl", &defines, "#version 300 es").unwrap();
        let lines: Vec<&str> = pp.source.split('\n').collect();
        assert_eq!(&lines[..3], &["#version 300 es", "#define A 1", "#define B 2"]);
        assert_eq!(pp.source_map.locate(2).unwrap().uri, DEFINES_URI);
    }

    #[test]
    fn flattening_is_deterministic() {
        let r = registry();
        let defines = ShaderDefines::new().with("Q", 4);
        let a = preprocess(&r, "main.fs", &defines, PREAMBLE).unwrap();
        let b = preprocess(&r, "main.fs", &defines, PREAMBLE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn every_flat_line_maps_back_to_its_origin() {
        let r = registry();
        let pp = preprocess(&r, "main.fs", &ShaderDefines::new().with("X", 1), PREAMBLE).unwrap();
        for (i, line) in pp.source.split('\n').enumerate() {
            let loc = pp.source_map.locate(i + 1).unwrap();
            if loc.uri == PREAMBLE_URI || loc.uri == DEFINES_URI {
                continue;
            }
            let origin = r.get(&loc.uri).unwrap().split('\n').nth(loc.line - 1).unwrap();
            assert_eq!(origin, line, "flat line {}", i + 1);
        }
    }

    #[test]
    fn preamble_offsets_fragment_lines() {
        // 5 preamble lines, main fragment starts at flat line 6.
        let pp = preprocess(&registry(), "main.fs", &ShaderDefines::new(), PREAMBLE).unwrap();
        let loc = pp.source_map.locate(6).unwrap();
        assert_eq!((loc.uri.as_str(), loc.line), ("main.fs", 1));
        let loc = pp.source_map.locate(7).unwrap();
        assert_eq!((loc.uri.as_str(), loc.line), ("math.glsl", 1));
        let loc = pp.source_map.locate(11).unwrap();
        assert_eq!((loc.uri.as_str(), loc.line), ("main.fs", 3));
    }

    #[test]
    fn direct_cycle_reports_chain() {
        let mut r = SourceRegistry::new();
        r.add("a", "#include \"b\"").unwrap();
        r.add("b", "#include \"a\"").unwrap();
        let err = preprocess(&r, "a", &ShaderDefines::new(), "").unwrap_err();
        assert_eq!(err, SourceError::CircularInclude { chain: vec!["a".into(), "b".into(), "a".into()] });
    }

    #[test]
    fn self_include_is_a_cycle() {
        let mut r = SourceRegistry::new();
        r.add("a", "#include \"a\"").unwrap();
        assert!(matches!(
            preprocess(&r, "a", &ShaderDefines::new(), ""),
            Err(SourceError::CircularInclude { .. })
        ));
    }

    #[test]
    fn diamond_includes_are_not_cycles() {
        let mut r = SourceRegistry::new();
        r.add_many([
            ("top", "#include \"l\"\n#include \"r\""),
            ("l", "#include \"base\""),
            ("r", "#include \"base\""),
            ("base", "int b;"),
        ])
        .unwrap();
        let pp = preprocess(&r, "top", &ShaderDefines::new(), "").unwrap();
        assert_eq!(pp.source, "\nint b;\nint b;");
    }

    #[test]
    fn missing_include_is_not_found() {
        let mut r = SourceRegistry::new();
        r.add("a", "#include \"gone\"").unwrap();
        assert_eq!(
            preprocess(&r, "a", &ShaderDefines::new(), "").unwrap_err(),
            SourceError::NotFound { uri: "gone".into() }
        );
    }

    #[test]
    fn unregistered_entry_text() {
        let r = registry();
        let pp = preprocess_source(&r, "__anonymous__.fs", "#include \"math.glsl\"\nvoid main() {}", &ShaderDefines::new(), "").unwrap();
        assert_eq!(pp.source, "\nfloat sq(float x) { return x * x; }\nvoid main() {}");
        assert_eq!(pp.source_map.locate(3).unwrap().uri, "__anonymous__.fs");
    }
}
