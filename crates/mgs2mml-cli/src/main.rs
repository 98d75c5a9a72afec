//! Command-line reverse compiler: MGS in, MML (or JSON) out.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mgs2mml",
    version,
    about = "Reverse compiler for the MGSDRV music format"
)]
struct Args {
    /// Input MGS file.
    input: PathBuf,

    /// Output file. The standard output is used if not specified.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the decoded document as JSON instead of MML.
    #[arg(long)]
    json: bool,

    /// Suppress decoder warnings.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.quiet {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let data = fs::read(&args.input)
        .with_context(|| format!("failed to read '{}'", args.input.display()))?;
    let document = mgs_format::parse_document(&data)
        .with_context(|| format!("failed to decode '{}'", args.input.display()))?;

    let rendered = if args.json {
        serde_json::to_string_pretty(&document).context("failed to serialize document")?
    } else {
        mgs_mml::render_mml(&document)
    };

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write '{}'", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
