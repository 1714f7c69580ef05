use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ecostress_fetch::app::{EcostressCloud, Plan};
use ecostress_fetch::config::{ConfigLoader, ConfigSummary, ResolvedConfig, credentials_from_env};
use ecostress_fetch::domain::{Credentials, parse_timestamp};
use ecostress_fetch::download::{DownloadReport, TaskOutcome};
use ecostress_fetch::error::FetchError;
use ecostress_fetch::filter::MetadataPolicy;
use ecostress_fetch::geometry::BoundingBox;
use ecostress_fetch::output::{JsonOutput, OutputMode};

const EXIT_TASKS_FAILED: u8 = 4;

#[derive(Parser)]
#[command(name = "eco-fetch")]
#[command(about = "Download ECOSTRESS L2 cloud granules by acquisition time and bounding box")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Print machine-readable JSON on stdout")]
    json: bool,

    #[arg(long, global = true, help = "Config file (default: ./ecostress-fetch.json if present)")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Select matching granules and download them")]
    Download(DownloadArgs),
    #[command(about = "Print the listing page URL for every day of a range")]
    Days(RangeArgs),
    #[command(about = "Show the resolved configuration")]
    Config,
}

#[derive(Args, Clone)]
struct RangeArgs {
    #[arg(long, value_parser = parse_timestamp)]
    start: NaiveDateTime,

    #[arg(long, value_parser = parse_timestamp)]
    end: NaiveDateTime,
}

#[derive(Args, Clone)]
struct DownloadArgs {
    #[command(flatten)]
    range: RangeArgs,

    #[arg(long, allow_hyphen_values = true, help = "minLon,minLat,maxLon,maxLat")]
    bbox: BoundingBox,

    #[arg(long, short)]
    output: PathBuf,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, help = "Leave out granules whose metadata cannot be read instead of stopping")]
    skip_bad_metadata: bool,

    #[arg(long, help = "Only list what would be downloaded")]
    dry_run: bool,
}

enum Outcome {
    Done,
    TasksFailed,
}

fn main() -> ExitCode {
    match run() {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::TasksFailed) => ExitCode::from(EXIT_TASKS_FAILED),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<FetchError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &FetchError) -> u8 {
    match error {
        err if err.is_remote() => 3,
        FetchError::MissingConfig
        | FetchError::ConfigRead(_)
        | FetchError::ConfigParse(_)
        | FetchError::MissingCredentials => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<Outcome> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let mut config = ConfigLoader::resolve_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Download(args) => {
            if let Some(workers) = args.workers {
                config.download_workers = workers.max(1);
            }
            if args.skip_bad_metadata {
                config.metadata_policy = MetadataPolicy::Skip;
            }
            run_download(args, config, output_mode)
        }
        Commands::Days(args) => run_days(args, config, output_mode),
        Commands::Config => {
            JsonOutput::print_json(&ConfigSummary::from(&config)).into_diagnostic()?;
            Ok(Outcome::Done)
        }
    }
}

fn run_download(
    args: DownloadArgs,
    config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<Outcome> {
    let credentials = resolve_credentials(&config)?;
    let cloud = EcostressCloud::connect(&config, credentials)?;
    let RangeArgs { start, end } = args.range;

    if args.dry_run {
        let plan = cloud.plan(start, end, &args.bbox, &args.output)?;
        match output_mode {
            OutputMode::Json => JsonOutput::print_plan(&plan).into_diagnostic()?,
            OutputMode::Human => print_plan(&plan),
        }
        return Ok(Outcome::Done);
    }

    let report = cloud.download(start, end, &args.bbox, &args.output)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => print_report(&report),
    }
    if report.failed() > 0 {
        return Ok(Outcome::TasksFailed);
    }
    Ok(Outcome::Done)
}

fn run_days(
    args: RangeArgs,
    config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<Outcome> {
    let product = ecostress_fetch::filter::product_url(&config.base_url, &config.product)?;
    let range = ecostress_fetch::domain::TimeRange::new(args.start, args.end);
    let urls = ecostress_fetch::filter::day_urls(&product, &range)?
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    match output_mode {
        OutputMode::Json => JsonOutput::print_json(&urls).into_diagnostic()?,
        OutputMode::Human => {
            for url in urls {
                println!("{url}");
            }
        }
    }
    Ok(Outcome::Done)
}

/// Config file first, then the environment, then an interactive prompt.
fn resolve_credentials(config: &ResolvedConfig) -> Result<Credentials, FetchError> {
    if let Some(credentials) = config.credentials.clone() {
        return Ok(credentials);
    }
    if let Some(credentials) = credentials_from_env() {
        return Ok(credentials);
    }
    prompt_credentials()
}

fn prompt_credentials() -> Result<Credentials, FetchError> {
    eprintln!(
        "Please input your urs.earthdata.nasa.gov username and password. If you do not have one, \
         you can register here: https://urs.earthdata.nasa.gov/users/new"
    );
    let username = prompt_line("Username: ")?;
    let password =
        rpassword::prompt_password("Password: ").map_err(|_| FetchError::MissingCredentials)?;
    if username.is_empty() {
        return Err(FetchError::MissingCredentials);
    }
    Ok(Credentials::new(username, password))
}

fn prompt_line(label: &str) -> Result<String, FetchError> {
    let mut stderr = io::stderr();
    stderr
        .write_all(label.as_bytes())
        .and_then(|()| stderr.flush())
        .map_err(|_| FetchError::MissingCredentials)?;
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|_| FetchError::MissingCredentials)?;
    if read == 0 {
        return Err(FetchError::MissingCredentials);
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_plan(plan: &Plan) {
    println!("{} granules selected", plan.selected.len());
    for task in &plan.tasks {
        let state = if task.is_satisfied() {
            "present"
        } else {
            "pending"
        };
        println!("  [{state}] {} -> {}", task.remote_url, task.local_path.display());
    }
}

fn print_report(report: &DownloadReport) {
    println!(
        "downloaded {}, skipped {}, failed {}",
        report.downloaded(),
        report.skipped(),
        report.failed()
    );
    for item in &report.items {
        match &item.outcome {
            TaskOutcome::Downloaded { bytes } => {
                println!("  downloaded {} ({bytes} bytes)", item.local_path.display())
            }
            TaskOutcome::Skipped => println!("  skipped    {}", item.local_path.display()),
            TaskOutcome::Failed { error } => {
                println!("  failed     {}: {error}", item.remote_url)
            }
        }
    }
}
