//! `#include "path"` directive scanning.
//!
//! Only whole-line directives are recognised: the line must start with
//! `#include`, followed by whitespace and a double-quoted, non-empty path, and
//! nothing but whitespace afterwards. Anything else is ordinary source and is
//! left for the shader compiler.

use std::collections::BTreeSet;

const DIRECTIVE: &str = "#include";

// ── Directive ─────────────────────────────────────────────────────────────

/// Returns the included path if `line` is an include directive.
pub fn parse_include(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(DIRECTIVE)?;

    let after_ws = rest.trim_start();
    if after_ws.len() == rest.len() {
        // `#includefoo` or a bare `#include`.
        return None;
    }

    let quoted = after_ws.strip_prefix('"')?;
    let end = quoted.find('"')?;
    let (path, tail) = quoted.split_at(end);
    if path.is_empty() || !tail[1..].trim().is_empty() {
        return None;
    }
    Some(path)
}

/// Set of paths directly included by `src`.
pub fn direct_includes(src: &str) -> BTreeSet<String> {
    src.split('\n')
        .filter_map(parse_include)
        .map(str::to_owned)
        .collect()
}

// ── Line runs ─────────────────────────────────────────────────────────────

/// A contiguous run of lines of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRun<'s> {
    /// Plain source lines, in order.
    Source(Vec<&'s str>),
    /// Consecutive include directives; holds the included paths.
    Include(Vec<&'s str>),
}

impl LineRun<'_> {
    /// Number of lines of the fragment the run covers.
    pub fn line_count(&self) -> usize {
        match self {
            LineRun::Source(lines) | LineRun::Include(lines) => lines.len(),
        }
    }
}

/// Splits `src` into alternating runs of source lines and include directives.
pub fn line_runs(src: &str) -> Vec<LineRun<'_>> {
    let mut runs: Vec<LineRun<'_>> = Vec::new();
    for line in src.split('\n') {
        match (parse_include(line), runs.last_mut()) {
            (Some(path), Some(LineRun::Include(paths))) => paths.push(path),
            (Some(path), _) => runs.push(LineRun::Include(vec![path])),
            (None, Some(LineRun::Source(lines))) => lines.push(line),
            (None, _) => runs.push(LineRun::Source(vec![line])),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_include ─────────────────────────────────────────────────────

    #[test]
    fn plain_directive() {
        assert_eq!(parse_include(r#"#include "common.glsl""#), Some("common.glsl"));
    }

    #[test]
    fn extra_whitespace_and_trailing_cr() {
        assert_eq!(parse_include("#include\t  \"a/b.glsl\"  \r"), Some("a/b.glsl"));
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(parse_include(r#"#include"a.glsl""#), None);
    }

    #[test]
    fn rejects_indented_directive() {
        assert_eq!(parse_include(r#"  #include "a.glsl""#), None);
    }

    #[test]
    fn rejects_empty_path_and_trailing_tokens() {
        assert_eq!(parse_include(r#"#include """#), None);
        assert_eq!(parse_include(r#"#include "a.glsl" // note"#), None);
        assert_eq!(parse_include("#include <a.glsl>"), None);
    }

    // ── runs ──────────────────────────────────────────────────────────────

    #[test]
    fn groups_contiguous_lines() {
        let src = "a\nb\n#include \"x\"\n#include \"y\"\nc";
        assert_eq!(
            line_runs(src),
            vec![
                LineRun::Source(vec!["a", "b"]),
                LineRun::Include(vec!["x", "y"]),
                LineRun::Source(vec!["c"]),
            ]
        );
    }

    #[test]
    fn direct_includes_dedups() {
        let deps = direct_includes("#include \"b\"\nvoid f();\n#include \"a\"\n#include \"b\"");
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
