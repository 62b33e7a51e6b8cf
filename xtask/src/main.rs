use anyhow::{Context, Result};
use clap::Parser;
use perfreplay_common::{TraceEntry, HEADER_PREFIX, REPLAY_MARKER};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Write a synthetic, evenly spaced trace for smoke-testing a replay target
    GenTrace {
        /// Number of trace lines
        #[arg(long, default_value = "100")]
        count: u64,
        /// Gap between consecutive entries in milliseconds
        #[arg(long, default_value = "100")]
        interval: u64,
        /// Query template; `{n}` is replaced with the line number
        #[arg(long, default_value = "q=item{n}&rows=10")]
        query: String,
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::GenTrace { count, interval, query, output } => {
            let out: Box<dyn Write> = match &output {
                Some(path) => Box::new(
                    File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
                ),
                None => Box::new(std::io::stdout()),
            };
            gen_trace(BufWriter::new(out), count, interval, &query)?;
            if let Some(path) = output {
                eprintln!("✓ Trace written to {}", path.display());
                eprintln!("  Lines: {count}, spacing: {interval}ms, span: {}ms", count.saturating_sub(1) * interval);
            }
        }
    }

    Ok(())
}

fn gen_trace<W: Write>(mut out: W, count: u64, interval: u64, template: &str) -> Result<()> {
    writeln!(out, "{HEADER_PREFIX} perfreplay trace")?;
    writeln!(out, "{HEADER_PREFIX} synthetic: {count} lines every {interval}ms")?;
    for n in 0..count {
        let query = format!("{}&{REPLAY_MARKER}", template.replace("{n}", &n.to_string()));
        out.write_all(TraceEntry::new(n * interval, query).to_line().as_bytes())?;
    }
    out.flush().context("Failed to write trace")?;
    Ok(())
}
