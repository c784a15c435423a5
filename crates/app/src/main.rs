use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use prep_core::model::Question;
use services::{AppConfig, AppServices, Clock, SubscriptionClient, load_items};
use tracing_subscriber::EnvFilter;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLimit { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  prep quiz         [--api <url>] [--limit <n>] [--items <file.json>]");
    eprintln!("  prep subscription [--token <access token>]");
    eprintln!();
    eprintln!("Defaults for quiz:");
    eprintln!("  --api   http://localhost:8000/api");
    eprintln!("  --limit 20");
    eprintln!();
    eprintln!("Environment (also read from .env):");
    eprintln!("  PREP_API_URL, PREP_API_TIMEOUT_SECS, PREP_PAGE_SIZE,");
    eprintln!("  PREP_SUBSCRIPTION_URL, PREP_ACCESS_TOKEN, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quiz,
    Subscription,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "subscription" => Some(Self::Subscription),
            _ => None,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    api_url: Option<String>,
    limit: Option<u32>,
    items: Option<PathBuf>,
    token: Option<String>,
}

impl Args {
    fn parse_quiz(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => parsed.api_url = Some(require_value(args, "--api")?),
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    let limit = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidLimit { raw: value })?;
                    parsed.limit = Some(limit);
                }
                "--items" => parsed.items = Some(require_value(args, "--items")?.into()),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }

    fn parse_subscription(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--token" => parsed.token = Some(require_value(args, "--token")?),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }

    fn apply(&self, config: &mut AppConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(api_url) = &self.api_url {
            config.question_bank = config.question_bank.clone().with_base_url(api_url)?;
        }
        if let Some(limit) = self.limit {
            config.page_size = limit;
        }
        if let Some(token) = &self.token {
            config.access_token = Some(token.clone());
        }
        Ok(())
    }
}

fn init_tracing() {
    // Logs go to stderr so they don't interleave with the quiz on stdout.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means quiz.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Quiz,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Quiz,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = match cmd {
        Command::Quiz => Args::parse_quiz(&mut iter),
        Command::Subscription => Args::parse_subscription(&mut iter),
    }
    .map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = AppConfig::from_env()?;
    parsed.apply(&mut config)?;
    let services = AppServices::new(&config, Clock::default_clock())?;

    match cmd {
        Command::Quiz => {
            let preselected: Vec<Question> = match &parsed.items {
                Some(path) => load_items(path)?,
                None => Vec::new(),
            };
            tracing::debug!(
                api = %config.question_bank.base_url,
                page_size = config.page_size,
                preselected = preselected.len(),
                "starting quiz"
            );
            terminal::run_quiz(&services, preselected).await?;
            Ok(())
        }
        Command::Subscription => {
            let Some(client) = services.subscription() else {
                eprintln!("PREP_SUBSCRIPTION_URL is not set.");
                return Ok(());
            };
            print_subscription(&client, services.access_token()).await?;
            Ok(())
        }
    }
}

async fn print_subscription(
    client: &Arc<SubscriptionClient>,
    token: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = client.check(token).await?;
    println!("subscribed:       {}", status.subscribed);
    println!(
        "product:          {}",
        status.product_id.as_deref().unwrap_or("-")
    );
    println!(
        "subscription end: {}",
        status.subscription_end.as_deref().unwrap_or("-")
    );
    println!("trial active:     {}", status.trial_active);
    println!(
        "trial end:        {}",
        status.trial_end_date.as_deref().unwrap_or("-")
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
