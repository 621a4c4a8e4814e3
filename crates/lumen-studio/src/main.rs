use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lumen_engine::logging::{init_logging, LoggingConfig};
use lumen_engine::DEFAULT_PREAMBLE;
use lumen_glsl::{preprocess, DefineValue, FileFetcher, MemoizedFetcher, ShaderDefines, SourceRegistry};

/// Inspect GLSL fragments and their #include trees.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Directory fragment URIs are resolved against.
    #[arg(long, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Macro definition, `NAME` or `NAME=VALUE`. Repeatable.
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// File whose contents replace the default GLSL ES 3.00 preamble.
    #[arg(long, value_name = "FILE")]
    preamble: Option<PathBuf>,

    /// Log filter (env_logger syntax); overrides RUST_LOG.
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the flattened source of a fragment.
    Preprocess {
        uri: String,
        /// Print the source map instead of the source.
        #[arg(long)]
        map: bool,
    },
    /// Print every fragment a fragment reaches through #include.
    Deps {
        uri: String,
        /// Only direct includes.
        #[arg(long)]
        direct: bool,
    },
    /// Map a line of the flattened source back to its fragment.
    Locate {
        uri: String,
        /// 1-based line in the flattened source, as reported by a compiler.
        line: usize,
    },
}

fn parse_define(arg: &str) -> Result<(String, DefineValue)> {
    let (name, value) = arg.split_once('=').unwrap_or((arg, "1"));
    if name.is_empty() {
        bail!("empty macro name in -D {arg}");
    }
    let value = if let Ok(v) = value.parse::<i64>() {
        DefineValue::Int(v)
    } else if let Ok(v) = value.parse::<f64>() {
        DefineValue::Float(v)
    } else {
        DefineValue::Str(value.to_owned())
    };
    Ok((name.to_owned(), value))
}

fn load(root: PathBuf, uri: &str) -> Result<SourceRegistry> {
    let fetcher = MemoizedFetcher::new(FileFetcher::new(root));
    let mut registry = SourceRegistry::new();
    pollster::block_on(registry.fetch(&fetcher, [uri])).with_context(|| format!("failed to load {uri}"))?;
    log::debug!("loaded {} fragments", registry.len());
    Ok(registry)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig { env_filter: cli.log.clone(), ..LoggingConfig::default() });

    let mut defines = ShaderDefines::new();
    for arg in &cli.defines {
        let (name, value) = parse_define(arg)?;
        defines.insert(name, value);
    }
    let preamble = match &cli.preamble {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?,
        None => DEFAULT_PREAMBLE.to_owned(),
    };

    match cli.command {
        Command::Preprocess { uri, map } => {
            let registry = load(cli.root, &uri)?;
            let flat = preprocess(&registry, &uri, &defines, &preamble)?;
            if map {
                let mut first = 1;
                for span in flat.source_map.spans().iter().filter(|s| s.line_count > 0) {
                    let last = first + span.line_count - 1;
                    println!("{first:>5}-{last:<5} {}:{}", span.uri, span.first_line);
                    first = last + 1;
                }
            } else {
                println!("{}", flat.source);
            }
        }
        Command::Deps { uri, direct } => {
            let registry = load(cli.root, &uri)?;
            let deps = if direct { registry.direct_deps(&uri)? } else { registry.transitive_deps(&uri)? };
            for dep in deps.iter().filter(|d| **d != uri) {
                println!("{dep}");
            }
        }
        Command::Locate { uri, line } => {
            let registry = load(cli.root, &uri)?;
            let flat = preprocess(&registry, &uri, &defines, &preamble)?;
            let Some(origin) = flat.source_map.locate(line) else {
                bail!("line {line} is outside the {} flattened lines of {uri}", flat.source_map.line_count());
            };
            let text = flat.source.split('\n').nth(line - 1).unwrap_or_default();
            println!("{}:{}: {text}", origin.uri, origin.line);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_values_are_typed() {
        assert_eq!(parse_define("TAPS=9").unwrap(), ("TAPS".into(), DefineValue::Int(9)));
        assert_eq!(parse_define("SIGMA=1.5").unwrap(), ("SIGMA".into(), DefineValue::Float(1.5)));
        assert_eq!(parse_define("MODE=fast").unwrap(), ("MODE".into(), DefineValue::Str("fast".into())));
        assert_eq!(parse_define("SHADOWS").unwrap(), ("SHADOWS".into(), DefineValue::Int(1)));
        assert!(parse_define("=3").is_err());
    }

    #[test]
    fn cli_parses_repeated_defines() {
        let cli = Cli::try_parse_from(["lumen-studio", "-D", "A=1", "-D", "B", "deps", "main.fs"]).unwrap();
        assert_eq!(cli.defines, ["A=1", "B"]);
        assert!(matches!(cli.command, Command::Deps { ref uri, direct: false } if uri == "main.fs"));
    }
}
