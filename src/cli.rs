//! Command-line interface definition

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for analysis results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text report (default)
    Text,
    /// JSON for machine parsing
    Json,
    /// CSV for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "sshlens")]
#[command(version)]
#[command(about = "SSH auth log risk scoring with isolation forest outlier detection")]
pub struct Cli {
    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train a model from a raw auth log or structured CSV
    Train(TrainArgs),
    /// Score a log against a trained model
    Analyze(AnalyzeArgs),
    /// Generate a synthetic auth log
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training input: raw auth log, or structured rows if it ends in .csv
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Directory holding the model artifact
    #[arg(long, value_name = "DIR", default_value = "models")]
    pub model_dir: PathBuf,

    /// Number of trees in the ensemble
    #[arg(long, value_name = "N", default_value = "150")]
    pub trees: usize,

    /// Expected fraction of anomalous records, in (0.0, 0.5]
    #[arg(long, value_name = "FRACTION", default_value = "0.1")]
    pub contamination: f64,

    /// Seed for a reproducible fit
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Year assumed for year-less raw log timestamps (default: current year)
    #[arg(long, value_name = "YEAR")]
    pub year: Option<i32>,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input to score: raw auth log, or structured rows if it ends in .csv
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Directory holding the model artifact
    #[arg(long, value_name = "DIR", default_value = "models")]
    pub model_dir: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Year assumed for year-less raw log timestamps (default: current year)
    #[arg(long, value_name = "YEAR")]
    pub year: Option<i32>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of records to generate
    #[arg(long, value_name = "N", default_value = "200")]
    pub count: usize,

    /// Raw log output path (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write a labeled CSV in the structured input format
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Seed for reproducible batches
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::parse_from(["sshlens", "train", "--input", "auth.log"]);
        let Command::Train(args) = cli.command else {
            panic!("expected train subcommand");
        };

        assert_eq!(args.input, PathBuf::from("auth.log"));
        assert_eq!(args.model_dir, PathBuf::from("models"));
        assert_eq!(args.trees, 150);
        assert_eq!(args.contamination, 0.1);
        assert_eq!(args.seed, None);
        assert_eq!(args.year, None);
    }

    #[test]
    fn test_train_overrides() {
        let cli = Cli::parse_from([
            "sshlens", "train", "-i", "data.csv", "--model-dir", "/tmp/m", "--trees", "50",
            "--contamination", "0.2", "--seed", "42", "--year", "2024",
        ]);
        let Command::Train(args) = cli.command else {
            panic!("expected train subcommand");
        };

        assert_eq!(args.input, PathBuf::from("data.csv"));
        assert_eq!(args.model_dir, PathBuf::from("/tmp/m"));
        assert_eq!(args.trees, 50);
        assert_eq!(args.contamination, 0.2);
        assert_eq!(args.seed, Some(42));
        assert_eq!(args.year, Some(2024));
    }

    #[test]
    fn test_analyze_format_values() {
        for (flag, expected) in [
            ("text", OutputFormat::Text),
            ("json", OutputFormat::Json),
            ("csv", OutputFormat::Csv),
        ] {
            let cli = Cli::parse_from(["sshlens", "analyze", "-i", "auth.log", "--format", flag]);
            let Command::Analyze(args) = cli.command else {
                panic!("expected analyze subcommand");
            };
            assert_eq!(args.format, expected);
        }
    }

    #[test]
    fn test_analyze_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["sshlens", "analyze", "-i", "a.log", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::parse_from(["sshlens", "simulate"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate subcommand");
        };

        assert_eq!(args.count, 200);
        assert!(args.output.is_none());
        assert!(args.csv.is_none());
    }

    #[test]
    fn test_global_debug_flag() {
        let cli = Cli::parse_from(["sshlens", "simulate", "--debug"]);
        assert!(cli.debug);

        let cli = Cli::parse_from(["sshlens", "--debug", "simulate"]);
        assert!(cli.debug);
    }

    #[test]
    fn test_input_is_required() {
        assert!(Cli::try_parse_from(["sshlens", "train"]).is_err());
        assert!(Cli::try_parse_from(["sshlens", "analyze"]).is_err());
    }
}
