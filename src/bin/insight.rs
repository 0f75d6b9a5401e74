//! Insight CLI - Command-line interface for Synheart Insight
//!
//! Commands:
//! - analyze: Generate the prioritized insight report and relapse risk
//! - correlate: Build the correlation matrix or list significant correlations
//! - risk: Score relapse risk with its contributing factors
//! - sample: Generate a synthetic analysis input
//! - catalog: Print the effective biomarker catalog

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use synheart_insight::correlation::DEFAULT_SIGNIFICANCE_LEVEL;
use synheart_insight::pipeline::{envelope, parse_input};
use synheart_insight::sample::{SampleGenerator, Scenario};
use synheart_insight::types::AnalysisInput;
use synheart_insight::{ComputeError, InsightEngine, INSIGHT_VERSION};

/// Insight - On-device analytics for biomarker and mood histories
#[derive(Parser)]
#[command(name = "insight")]
#[command(author = "Synheart AI Inc")]
#[command(version = INSIGHT_VERSION)]
#[command(about = "Correlate biomarkers with mood, detect patterns and score relapse risk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate insights and relapse risk
    Analyze {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Build the correlation matrix
    Correlate {
        #[command(flatten)]
        common: CommonArgs,

        /// List significant biomarker × mood correlations instead of the matrix
        #[arg(long)]
        significant: bool,

        /// Significance level for --significant
        #[arg(long, default_value_t = DEFAULT_SIGNIFICANCE_LEVEL)]
        significance: f64,
    },

    /// Score relapse risk
    Risk {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate a synthetic analysis input
    Sample {
        /// Number of days to generate
        #[arg(long, default_value = "14")]
        days: u32,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// History shape
        #[arg(long, value_enum, default_value = "stable")]
        scenario: ScenarioArg,

        /// First day (YYYY-MM-DD); defaults to `days` before today
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Print the effective biomarker catalog
    Catalog {
        /// Catalog file to validate and print instead of the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct CommonArgs {
    /// Input file path (use - for stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    /// Biomarker catalog file (JSON)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "json")]
    output_format: OutputFormat,

    /// Wrap the result with producer metadata
    #[arg(long)]
    envelope: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioArg {
    Stable,
    Inflamed,
    DecliningMood,
}

impl From<ScenarioArg> for Scenario {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Stable => Scenario::Stable,
            ScenarioArg::Inflamed => Scenario::Inflamed,
            ScenarioArg::DecliningMood => Scenario::DecliningMood,
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synheart_insight=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), InsightCliError> {
    match cli.command {
        Commands::Analyze { common } => cmd_analyze(&common),

        Commands::Correlate {
            common,
            significant,
            significance,
        } => cmd_correlate(&common, significant, significance),

        Commands::Risk { common } => cmd_risk(&common),

        Commands::Sample {
            days,
            seed,
            scenario,
            start,
            output_format,
        } => cmd_sample(days, seed, scenario.into(), start, &output_format),

        Commands::Catalog { catalog } => cmd_catalog(catalog.as_deref()),
    }
}

fn cmd_analyze(common: &CommonArgs) -> Result<(), InsightCliError> {
    let (engine, input) = prepare(common)?;
    let report = engine.generate_insights(&input.biomarkers, &input.moods);

    tracing::info!(
        insights = report.insights.len(),
        relapse_risk = report.relapse_risk,
        "Analysis complete"
    );
    emit(&report, common)
}

fn cmd_correlate(
    common: &CommonArgs,
    significant: bool,
    significance: f64,
) -> Result<(), InsightCliError> {
    if !(significance > 0.0 && significance < 1.0) {
        return Err(InsightCliError::InvalidArgument(format!(
            "significance must be between 0 and 1, got {}",
            significance
        )));
    }

    let (engine, input) = prepare(common)?;

    if significant {
        let results =
            engine.significant_correlations(&input.biomarkers, &input.moods, significance);
        emit(&results, common)
    } else {
        let matrix = engine.correlation_matrix(&input.biomarkers, &input.moods, input.date_range);
        emit(&matrix, common)
    }
}

fn cmd_risk(common: &CommonArgs) -> Result<(), InsightCliError> {
    let (engine, input) = prepare(common)?;
    let assessment = engine.assess_relapse_risk(&input.biomarkers, &input.moods);
    emit(&assessment, common)
}

fn cmd_sample(
    days: u32,
    seed: u64,
    scenario: Scenario,
    start: Option<NaiveDate>,
    output_format: &OutputFormat,
) -> Result<(), InsightCliError> {
    if days == 0 {
        return Err(InsightCliError::InvalidArgument(
            "days must be at least 1".to_string(),
        ));
    }

    let start = match start {
        Some(date) => Utc.from_utc_datetime(&date.and_time(NaiveTime::default())),
        None => {
            let first = Utc::now().date_naive() - chrono::Duration::days(days as i64);
            Utc.from_utc_datetime(&first.and_time(NaiveTime::default()))
        }
    };

    let input = SampleGenerator::new(seed).generate(start, days, scenario);
    println!("{}", format_output(&input, output_format)?);
    Ok(())
}

fn cmd_catalog(catalog: Option<&Path>) -> Result<(), InsightCliError> {
    let engine = load_engine(catalog)?;
    println!("{}", engine.save_catalog()?);
    Ok(())
}

/// Engine with the requested catalog plus the parsed input
fn prepare(common: &CommonArgs) -> Result<(InsightEngine, AnalysisInput), InsightCliError> {
    let engine = load_engine(common.catalog.as_deref())?;
    let input = parse_input(&read_input(&common.input)?)?;

    tracing::debug!(
        biomarkers = input.biomarkers.len(),
        moods = input.moods.len(),
        "Loaded analysis input"
    );
    Ok((engine, input))
}

fn load_engine(catalog: Option<&Path>) -> Result<InsightEngine, InsightCliError> {
    let mut engine = InsightEngine::new();
    if let Some(path) = catalog {
        let catalog_json = fs::read_to_string(path)?;
        engine.load_catalog(&catalog_json)?;
    }
    Ok(engine)
}

fn read_input(input: &Path) -> Result<String, InsightCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(InsightCliError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn emit<T: Serialize>(value: &T, common: &CommonArgs) -> Result<(), InsightCliError> {
    let output = if common.envelope {
        format_output(&envelope(value), &common.output_format)?
    } else {
        format_output(value, &common.output_format)?
    };
    println!("{}", output);
    Ok(())
}

fn format_output<T: Serialize>(value: &T, format: &OutputFormat) -> Result<String, InsightCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

// Error handling

#[derive(Debug)]
enum InsightCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoInput,
    InvalidArgument(String),
}

impl From<io::Error> for InsightCliError {
    fn from(e: io::Error) -> Self {
        InsightCliError::Io(e)
    }
}

impl From<ComputeError> for InsightCliError {
    fn from(e: ComputeError) -> Self {
        InsightCliError::Compute(e)
    }
}

impl From<serde_json::Error> for InsightCliError {
    fn from(e: serde_json::Error) -> Self {
        InsightCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InsightCliError> for CliError {
    fn from(e: InsightCliError) -> Self {
        match e {
            InsightCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InsightCliError::Compute(e @ ComputeError::InvalidCatalog(_)) => CliError {
                code: "CATALOG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'insight catalog' to see the expected layout".to_string()),
            },
            InsightCliError::Compute(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(
                    "Ensure input has 'biomarkers' and 'moods' arrays with RFC 3339 timestamps"
                        .to_string(),
                ),
            },
            InsightCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InsightCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "No input provided on stdin".to_string(),
                hint: Some("Pipe a JSON document or pass --input <file>".to_string()),
            },
            InsightCliError::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synheart_insight::BiomarkerCatalog;

    #[test]
    fn test_malformed_catalog_maps_to_catalog_error() {
        let err = BiomarkerCatalog::from_json("{\"definitions\": [").unwrap_err();
        let cli_error = CliError::from(InsightCliError::from(err));
        assert_eq!(cli_error.code, "CATALOG_ERROR");
    }

    #[test]
    fn test_input_errors_map_to_parse_error() {
        let err = parse_input("not json").unwrap_err();
        let cli_error = CliError::from(InsightCliError::from(err));
        assert_eq!(cli_error.code, "PARSE_ERROR");
    }
}
