//! Rift match CLI
//!
//! Loads a set of expectations and reports, for each request in a file,
//! which expectation it matched and why the others didn't.
//!
//! Usage:
//!   rift-match --expectations expectations.yaml --request requests.json [OPTIONS]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rift_match::log::{init_logging, LogFormat};
use rift_match::{
    Expectation, ExpectationStore, HttpRequest, InMemoryMatchLog, MatchLogType, MatcherConfig,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Rift match - check requests against expectations offline
#[derive(Parser, Debug)]
#[command(name = "rift-match")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Expectations file (JSON or YAML, one expectation or a list)
    #[arg(short, long)]
    expectations: String,

    /// Requests file (JSON, one request or a list)
    #[arg(short, long)]
    request: String,

    /// Matcher configuration file (YAML)
    #[arg(short, long, env = "RIFT_MATCH_CONFIG")]
    config: Option<String>,

    /// Evaluate every field even after one has failed
    #[arg(long)]
    no_fail_fast: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormatArg,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

fn read_list<T: DeserializeOwned>(path: &str) -> Result<Vec<T>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("unable to read {path}"))?;
    let is_yaml = Path::new(path)
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    let parsed: OneOrMany<T> = if is_yaml {
        serde_yaml::from_str(&contents).with_context(|| format!("invalid YAML in {path}"))?
    } else {
        serde_json::from_str(&contents).with_context(|| format!("invalid JSON in {path}"))?
    };
    Ok(parsed.into_vec())
}

fn paint(text: &str, color: &str, enabled: bool) -> String {
    if enabled {
        format!("{color}{text}{RESET}")
    } else {
        text.to_string()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_format.into(), "rift_match=warn");

    let mut config = match &args.config {
        Some(path) => MatcherConfig::from_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => MatcherConfig::default(),
    };
    if args.no_fail_fast {
        config = config.with_fail_fast(false);
    }

    let log = Arc::new(InMemoryMatchLog::new());
    let store = ExpectationStore::new(config, log.clone());
    for expectation in read_list::<Expectation>(&args.expectations)? {
        let id = expectation.id.clone();
        store
            .add(expectation)
            .with_context(|| format!("invalid expectation {id}"))?;
    }
    tracing::info!("Loaded {} expectations", store.size());

    let color = !args.no_color;
    let requests = read_list::<HttpRequest>(&args.request)?;
    let mut unmatched = 0;
    for (index, request) in requests.iter().enumerate() {
        log.clear();
        let label = format!(
            "#{index} {} {}",
            request.method.value(),
            request.path.value()
        );
        match store.first_matching_expectation(request) {
            Some(expectation) => {
                println!("{} {label} -> {}", paint("MATCH", GREEN, color), expectation.id);
            }
            None => {
                unmatched += 1;
                println!("{} {label}", paint("NO MATCH", RED, color));
            }
        }
        for event in log.events_of(MatchLogType::ExpectationNotMatched) {
            let id = event.expectation_id.as_deref().unwrap_or("<none>");
            println!("  expectation {id}:");
            if let Some(because) = &event.because {
                for line in because.lines().filter(|line| !line.is_empty()) {
                    println!("    {}", paint(line, DIM, color));
                }
            }
        }
    }

    println!(
        "\n{} requests, {} matched, {} unmatched",
        requests.len(),
        requests.len() - unmatched,
        unmatched
    );
    if unmatched > 0 {
        std::process::exit(1);
    }
    Ok(())
}
