use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sshlens::cli::{AnalyzeArgs, Cli, Command, OutputFormat, SimulateArgs, TrainArgs};
use sshlens::isolation_forest::ForestConfig;
use sshlens::json_output::JsonReport;
use sshlens::model_store::ModelStore;
use sshlens::parser::{LogParser, ParsedRecord};
use sshlens::report::{self, RiskSummary};
use sshlens::simulate::{self, SimulatorConfig};
use sshlens::{csv_output, pipeline};

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_parser(year: Option<i32>) -> LogParser {
    match year {
        Some(year) => LogParser::new().with_assumed_year(year),
        None => LogParser::new(),
    }
}

/// Load records from either input shape: structured rows for `.csv` paths,
/// raw auth lines otherwise.
fn load_records(parser: &LogParser, path: &Path) -> Result<Vec<ParsedRecord>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let records = if is_csv {
        parser.load_csv_file(path)?
    } else {
        parser.load_log_file(path)?
    };

    if records.is_empty() {
        bail!("no parsable records in {}", path.display());
    }
    Ok(records)
}

fn run_train(args: TrainArgs) -> Result<()> {
    if args.trees == 0 {
        bail!("--trees must be at least 1");
    }
    if !(args.contamination > 0.0 && args.contamination <= 0.5) {
        bail!("--contamination must be in (0.0, 0.5], got {}", args.contamination);
    }

    let parser = build_parser(args.year);
    let records = load_records(&parser, &args.input)?;

    let config = ForestConfig {
        n_estimators: args.trees,
        contamination: args.contamination,
        seed: args.seed,
    };
    let artifact = pipeline::train(&records, &config)?;

    let store = ModelStore::new(&args.model_dir);
    store.save(&artifact)?;

    println!(
        "trained on {} records ({} trees, contamination {}, threshold {:.4})",
        records.len(),
        artifact.forest.num_trees(),
        artifact.forest.contamination(),
        artifact.forest.threshold()
    );
    println!("model saved to {}", args.model_dir.display());
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let parser = build_parser(args.year);
    let records = load_records(&parser, &args.input)?;

    let store = ModelStore::new(&args.model_dir);
    let artifact = store.load()?;

    let results = pipeline::score(&records, &artifact)?;
    let summary = RiskSummary::from_results(&results);

    match args.format {
        OutputFormat::Text => {
            print!("{}", summary.format());
            print!("{}", report::format_flagged(&results));
        }
        OutputFormat::Json => {
            println!("{}", JsonReport::new(&summary, &results).to_json()?);
        }
        OutputFormat::Csv => {
            print!("{}", csv_output::results_to_csv(&results));
        }
    }
    Ok(())
}

fn run_simulate(args: SimulateArgs) -> Result<()> {
    let config = SimulatorConfig {
        count: args.count,
        seed: args.seed,
    };
    let batch = simulate::generate_batch(&config);
    let raw = simulate::to_raw_log(&batch);

    match &args.output {
        Some(path) => {
            std::fs::write(path, raw + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {} log lines to {}", batch.len(), path.display());
        }
        None => println!("{}", raw),
    }

    if let Some(path) = &args.csv {
        std::fs::write(path, simulate::to_labeled_csv(&batch))
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote labeled csv to {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Command::Train(args) => run_train(args),
        Command::Analyze(args) => run_analyze(args),
        Command::Simulate(args) => run_simulate(args),
    }
}
