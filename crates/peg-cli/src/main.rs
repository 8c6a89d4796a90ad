//! Command-line entry point: a thin collaborator around `peg-core` and
//! `peg-codegen`, specified only for interface compatibility (argument
//! shapes, exit codes) rather than for any algorithmic fidelity of its own.

mod report;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser as _;

/// A PEG/Packrat parser generator: interpret an EBNF grammar directly, or
/// render it to a standalone Rust parser module.
#[derive(Debug, clap::Parser)]
#[command(name = "peg-cli", version, about)]
struct Cli {
    /// Path to the EBNF grammar source file.
    grammar_file: PathBuf,

    /// Grammar name; defaults to the grammar file's basename.
    #[arg(short = 'm', long = "name")]
    name: Option<String>,

    /// Output path. Required when `--binary` or `--draw` is given;
    /// otherwise generated source is printed to stdout when omitted.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Trace rule entry/exit while loading the grammar.
    #[arg(short = 't', long = "trace")]
    trace: bool,

    /// Emit a serialized grammar model (JSON) instead of Rust source.
    #[arg(short = 'b', long = "binary")]
    binary: bool,

    /// Emit a diagram. Diagram rendering is an external collaborator this
    /// workspace does not implement; the flag is accepted and reported,
    /// not silently ignored.
    #[arg(short = 'd', long = "draw")]
    draw: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.draw {
        bail!("diagram rendering is not implemented by this tool");
    }
    if cli.binary && cli.output.is_none() {
        bail!("-o/--output is required with -b/--binary");
    }

    let name = cli.name.clone().unwrap_or_else(|| {
        cli.grammar_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "grammar".to_string())
    });

    let source = fs::read_to_string(&cli.grammar_file)
        .with_context(|| format!("reading {}", cli.grammar_file.display()))?;

    let grammar = peg_core::Parser::new(source)
        .trace(cli.trace)
        .filename(cli.grammar_file.to_string_lossy().into_owned())
        .parse_grammar()
        .map_err(|e| anyhow::anyhow!(report::render(&e)))?;

    let rendered = if cli.binary {
        let model = peg_codegen::GrammarModel::from(&grammar);
        serde_json::to_string_pretty(&model)?
    } else {
        peg_codegen::Module::from_grammar(name, &grammar).to_string()
    };

    match cli.output {
        Some(path) => {
            fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
