use std::fs;
use std::io::Read;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use cfrm_document::{load_fixtures, verify_case, Document};
use cfrm_ops::Operation;

use crate::cli::*;
use crate::config::CliConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    debug!(?config, source = ?cli.config, "loaded configuration");
    match cli.command {
        Command::Merge(args) => cmd_merge(args, cli.format, &config),
        Command::Flatten(args) => cmd_flatten(args, &config),
        Command::Mint(args) => cmd_mint(args, cli.format, &config),
        Command::Verify(args) => cmd_verify(args, cli.format, &config),
    }
}

fn cmd_merge(args: MergeArgs, format: OutputFormat, config: &CliConfig) -> anyhow::Result<()> {
    let input = read_input(&args.input)?;
    let mut doc = Document::new();
    let report = doc
        .ingest_json(&input)
        .with_context(|| format!("merging {}", args.input))?;

    println!("{}", doc.snapshot().to_json_string(config.output.pretty)?);
    if format == OutputFormat::Text {
        eprintln!(
            "{} Merged {} operations: {} live facts, {} pending",
            "✓".green().bold(),
            report.received.to_string().bold(),
            report.live_facts,
            report.pending,
        );
    }
    Ok(())
}

fn cmd_flatten(args: FlattenArgs, config: &CliConfig) -> anyhow::Result<()> {
    let input = read_input(&args.input)?;
    let document: Value =
        serde_json::from_str(&input).with_context(|| format!("parsing {}", args.input))?;
    let ops = flatten_documents(&document)?;
    print_json(&ops, config)
}

fn cmd_mint(args: MintArgs, format: OutputFormat, config: &CliConfig) -> anyhow::Result<()> {
    let ids: Vec<_> = (0..args.count).map(|_| cfrm_types::mint()).collect();
    match format {
        OutputFormat::Json => print_json(&ids, config),
        OutputFormat::Text => {
            for id in ids {
                println!("{id}");
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct CaseSummary {
    case: String,
    deliveries: usize,
    passed: bool,
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat, config: &CliConfig) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.fixtures)
        .with_context(|| format!("reading fixtures {}", args.fixtures.display()))?;
    let cases = load_fixtures(&text)
        .with_context(|| format!("loading fixtures {}", args.fixtures.display()))?;

    let mut options = config.verify_options();
    if let Some(seed) = args.seed {
        options.seed = seed;
    }

    let mut summaries = Vec::with_capacity(cases.len());
    for case in &cases {
        let report = verify_case(case, &options)?;
        if format == OutputFormat::Text {
            match &report.mismatch {
                None => println!(
                    "{} {} ({} deliveries)",
                    "✓".green(),
                    report.case,
                    report.deliveries
                ),
                Some(mismatch) => {
                    println!("{} {}", "✗".red().bold(), report.case.bold());
                    println!("  Ordering: {:?}", mismatch.ordering);
                    if let Some(split) = mismatch.split {
                        println!("  Split at: {split}");
                    }
                    println!("  Expected: {}", serde_json::to_string(&case.result)?.green());
                    println!("  Actual:   {}", serde_json::to_string(&mismatch.actual)?.red());
                }
            }
        }
        summaries.push(CaseSummary {
            passed: report.passed(),
            case: report.case,
            deliveries: report.deliveries,
        });
    }

    if format == OutputFormat::Json {
        print_json(&summaries, config)?;
    }

    let failed = summaries.iter().filter(|s| !s.passed).count();
    if failed > 0 {
        bail!("{failed} of {} fixture cases diverged", summaries.len());
    }
    if format == OutputFormat::Text {
        println!("{} All {} cases converged", "✓".green().bold(), summaries.len());
    }
    Ok(())
}

/// Flatten one document object, or each object of an array, into one batch.
fn flatten_documents(document: &Value) -> anyhow::Result<Vec<Operation>> {
    match document {
        Value::Array(items) => {
            let mut ops = Vec::new();
            for (index, item) in items.iter().enumerate() {
                let flattened =
                    cfrm_ops::flatten(item).with_context(|| format!("flattening document {index}"))?;
                ops.extend(flattened);
            }
            Ok(ops)
        }
        other => Ok(cfrm_ops::flatten(other).context("flattening document")?),
    }
}

fn read_input(input: &str) -> anyhow::Result<String> {
    debug!(input, "reading input");
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        Ok(text)
    } else {
        fs::read_to_string(input).with_context(|| format!("reading {input}"))
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T, config: &CliConfig) -> anyhow::Result<()> {
    let text = if config.output.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
