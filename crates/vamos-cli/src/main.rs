//! vamos - compiler for the VAMOS stream-monitoring DSL

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vamos_cli::{compile_source, compile_source_tessla};

#[derive(Parser)]
#[command(name = "vamos")]
#[command(version)]
#[command(about = "Compile a VAMOS program into a shared-memory monitor", long_about = None)]
struct Cli {
    /// Input program (.vamos)
    input: PathBuf,

    /// Output path (positional form)
    output: Option<PathBuf>,

    /// Output path (flag form, wins over the positional one)
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Value substituted for @BUFSIZE (arbiter buffer capacity)
    #[arg(short = 'b', long = "bufsize", default_value = "64")]
    bufsize: usize,

    /// Emit through the Tessla backend (requires --dir)
    #[arg(short = 't', long = "with-tessla")]
    with_tessla: bool,

    /// Tessla companion project directory
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let output = match cli.out.or(cli.output) {
        Some(path) => path,
        None => bail!("no output path given (positional or -o/--out)"),
    };

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("cannot read input file {}", cli.input.display()))?;

    info!(input = %cli.input.display(), bufsize = cli.bufsize, "compiling");

    let warnings = if cli.with_tessla {
        let Some(dir) = cli.dir.as_deref() else {
            bail!("--with-tessla requires --dir <path> (tessla backend unavailable without a project directory)");
        };
        compile_source_tessla(&source, cli.bufsize, &output, dir)?
    } else {
        let compiled = compile_source(&source, cli.bufsize)?;
        fs::write(&output, compiled.code)
            .with_context(|| format!("cannot write output file {}", output.display()))?;
        compiled.warnings
    };

    for warning in &warnings {
        eprintln!("{}", warning);
    }

    info!(output = %output.display(), "compilation finished");
    Ok(())
}
