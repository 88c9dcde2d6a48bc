use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use flyticker::models::EvaluationReport;
use flyticker::orchestrator::load_forecasts;
use flyticker::{
    EvaluationOrchestrator, FlyTickerConfig, FlyTickerError, LocationCatalog, OpenAiClient,
    logging,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "flyticker",
    version,
    about = "Paragliding flyability ticker: forecast enrichment, hard safety limits and LLM ranking"
)]
struct Cli {
    /// Configuration file (defaults to the user config directory, then ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate every catalog location against its forecast
    Evaluate(EvaluateArgs),
    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// JSON list of launch site profiles
    #[arg(long)]
    catalog: PathBuf,
    /// JSON object mapping location names to hourly forecast samples
    #[arg(long)]
    forecast: PathBuf,
    /// Write the evaluations here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
    /// Override the configured reasoning model
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(flyticker_err) = err.downcast_ref::<FlyTickerError>() {
                eprintln!("{}", flyticker_err.user_message());
            }
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = FlyTickerConfig::load_from_path(cli.config.clone())
        .context("Failed to load configuration")?;
    logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Command::CheckConfig => {
            println!("Configuration OK");
            println!("  model: {}", config.llm.model);
            println!(
                "  flight hours: {:02}:00-{:02}:00 over {} days",
                config.flight_window.start_hour,
                config.flight_window.end_hour,
                config.flight_window.horizon_days
            );
            println!(
                "  limits: wind {} km/h, gusts {} km/h, precipitation {}%, cloud base +{} m",
                config.safety.max_wind_speed_kmh,
                config.safety.max_gust_kmh,
                config.safety.max_precipitation_probability_pct,
                config.safety.min_cloud_base_clearance_m
            );
            println!(
                "  API key: {}",
                if config.llm.api_key.is_some() {
                    "configured"
                } else {
                    "missing"
                }
            );
            Ok(())
        }
        Command::Evaluate(args) => {
            if let Some(model) = args.model.clone() {
                config.llm.model = model;
            }
            evaluate(&config, &args).await
        }
    }
}

async fn evaluate(config: &FlyTickerConfig, args: &EvaluateArgs) -> Result<()> {
    let catalog = LocationCatalog::from_json_file(&args.catalog)
        .with_context(|| format!("Invalid location catalog {}", args.catalog.display()))?;
    let forecasts = load_forecasts(&args.forecast)
        .with_context(|| format!("Invalid forecast {}", args.forecast.display()))?;
    debug!(
        "Loaded {} locations and {} forecasts",
        catalog.len(),
        forecasts.len()
    );

    let client = Arc::new(OpenAiClient::new(&config.llm)?);
    let orchestrator = EvaluationOrchestrator::from_config(config, client);
    let evaluations = orchestrator
        .evaluate_batch(&catalog, &forecasts, &config.safety, &config.flight_window)
        .await;

    let report = EvaluationReport::new(evaluations);
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize evaluations")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} evaluations to {}", report.evaluations.len(), path.display());
        }
        None => println!("{json}"),
    }

    for evaluation in report.flyable() {
        info!(
            "{} is flyable: {} (rating {}/10)",
            evaluation.location, evaluation.conditions, evaluation.rating
        );
    }
    Ok(())
}
