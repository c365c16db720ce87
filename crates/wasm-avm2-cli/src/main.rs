//! CLI driver for the Wasm-to-AVM2/SWF cross-compiler.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use wasm_avm2::{compile_to_abc, compile_with_config, LowerConfig, TraceOptions};

/// Compiles a WebAssembly module into ActionScript bytecode, either as a raw
/// `.abc` blob or wrapped in a loadable `.swf` movie.
#[derive(Debug, Parser)]
#[command(name = "wasm2swf", version, about)]
struct Cli {
    /// Input `.wasm` module.
    input: PathBuf,

    /// Output path; `.abc` emits a raw ABC blob, anything else a `.swf` movie.
    #[arg(short, long)]
    output: PathBuf,

    /// Emit a `Wrapper extends Sprite` class and register it as the SymbolClass.
    #[arg(long)]
    sprite: bool,

    /// Emit `debugfile`/`debugline` at each expression boundary.
    #[arg(long)]
    debug: bool,

    /// Emit trace callouts at each expression boundary.
    #[arg(long)]
    trace: bool,

    /// Emit trace callouts only at function entry/exit.
    #[arg(long)]
    trace_funcs: bool,

    /// Only trace these function names (comma-separated).
    #[arg(long, value_delimiter = ',')]
    trace_only: Option<Vec<String>>,

    /// Never trace these function names, even if otherwise enabled (comma-separated).
    #[arg(long, value_delimiter = ',')]
    trace_exclude: Option<Vec<String>>,

    /// Dump the input Wasm module's text form alongside the output.
    #[arg(long)]
    save_wat: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let wasm = fs::read(&cli.input)
        .with_context(|| format!("reading input module `{}`", cli.input.display()))?;

    if let Some(wat_path) = &cli.save_wat {
        let text = wasmprinter::print_bytes(&wasm)
            .with_context(|| format!("printing `{}` as WAT", cli.input.display()))?;
        fs::write(wat_path, text)
            .with_context(|| format!("writing WAT dump `{}`", wat_path.display()))?;
    }

    let config = LowerConfig {
        sprite: cli.sprite,
        trace: TraceOptions {
            debug: cli.debug,
            trace: cli.trace,
            trace_funcs: cli.trace_funcs,
            trace_only: cli.trace_only,
            trace_exclude: cli.trace_exclude,
        },
    };

    let is_abc = cli
        .output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("abc"));

    let bytes = if is_abc {
        compile_to_abc(&wasm, &config)
    } else {
        compile_with_config(&wasm, &config)
    }
    .with_context(|| format!("compiling `{}`", cli.input.display()))?;

    fs::write(&cli.output, &bytes)
        .with_context(|| format!("writing output `{}`", cli.output.display()))?;

    println!(
        "Compiled {} -> {} ({} bytes)",
        cli.input.display(),
        cli.output.display(),
        bytes.len()
    );
    Ok(())
}
