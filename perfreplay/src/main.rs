//! # perfreplay - Main Entry Point
//!
//! Two subcommands:
//! - **record**: classify log lines from stdin or a file into a trace
//! - **replay**: replay a trace against a service, exit with the run status

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use perfreplay::capture::{
    run_capture, standard_header, CaptureBuffer, Classifier, LineSource, MdcRequestClassifier,
    SolrLogClassifier, TraceWriter,
};
use perfreplay::cli::{Args, ClassifierKind, Command, RecordArgs, ReplayArgs};
use perfreplay::domain::Millis;
use perfreplay::export::RunReport;
use perfreplay::replay::{DryRunSender, HttpSender, ReplayOutcome, ReplayScheduler, ServiceSender};
use perfreplay_common::RunStatusCode;

fn main() {
    env_logger::init();
    let args = Args::parse();

    let result = match &args.command {
        Command::Record(record_args) => record(record_args),
        Command::Replay(replay_args) => replay(replay_args),
    };
    std::process::exit(match result {
        Ok(status) => status.code(),
        Err(e) => {
            eprintln!("error: {e:#}");
            RunStatusCode::IoError.code()
        }
    });
}

fn record(args: &RecordArgs) -> Result<RunStatusCode> {
    let config = args.capture_config();

    let source = match &args.input {
        Some(path) => LineSource::open(path)?,
        None => LineSource::stdin(),
    };
    let writer = match &args.output {
        Some(path) => TraceWriter::create(path, args.append)?,
        None => TraceWriter::stdout(),
    };
    let classifier: Box<dyn Classifier> = match args.classifier {
        ClassifierKind::Solr => Box::new(SolrLogClassifier),
        ClassifierKind::Mdc => Box::new(MdcRequestClassifier),
    };
    let buffer = CaptureBuffer::new(&config, writer).with_header(standard_header(config.application.clone()));

    info!(
        "Recording (buffer {}, duration {}, limit {})",
        config.reorder_tolerance, config.duration_limit, config.line_limit
    );
    let (stats, _) = run_capture(source.lines(), classifier.as_ref(), config.application.as_deref(), buffer)
        .context("Capture failed")?;

    info!(
        "Recorded {} of {} lines ({} rejected, {} malformed, {} filtered, {} beyond cutoff, {} out of order)",
        stats.buffer.emitted,
        stats.lines_read,
        stats.rejected,
        stats.malformed,
        stats.filtered,
        stats.buffer.discarded,
        stats.buffer.out_of_order
    );
    Ok(RunStatusCode::Ok)
}

#[tokio::main]
async fn replay(args: &ReplayArgs) -> Result<RunStatusCode> {
    let config = args.replay_config();
    let sender: Arc<dyn ServiceSender> = if args.dry_run {
        info!("Dry run, nothing is sent to {}", args.service);
        Arc::new(DryRunSender)
    } else {
        Arc::new(HttpSender::new(&args.service)?)
    };

    // The report sink must be writable before any call is sent
    let report = match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create report {}", path.display()))?;
            Some((path, BufWriter::new(file)))
        }
        None => None,
    };

    let outcome = ReplayScheduler::new(config.clone(), sender).run_file(&args.input).await;
    display_summary(&outcome);

    if let Some((path, writer)) = report {
        RunReport::new(&config, &outcome)
            .export(writer)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(outcome.status.code)
}

fn display_summary(outcome: &ReplayOutcome) {
    let stats = &outcome.statistics;
    println!("\n{}", "─".repeat(60));
    println!("Status:      {}", outcome.status);
    println!("Elapsed:     {}", Millis::from_duration(outcome.elapsed));
    println!("Lines read:  {}", outcome.lines_read);
    println!("Calls:       {} dispatched, {} recorded", outcome.dispatched, stats.call_stat.count);
    if outcome.abandoned > 0 {
        println!("Abandoned:   {} calls still running at shutdown", outcome.abandoned);
    }
    if stats.call_stat.count > 0 {
        println!(
            "Call time:   min {} / avg {:.1}ms / max {}",
            Millis(stats.call_stat.min),
            stats.call_stat.average,
            Millis(stats.call_stat.max)
        );
    }
    for (status, count) in &stats.counter {
        println!("  {status:>16}: {count}");
    }
    if let Some(percentiles) = &stats.percentiles {
        for (name, value) in percentiles {
            println!("  {name:>16}: {value:.1}ms");
        }
    }
    println!("{}", "─".repeat(60));
}
