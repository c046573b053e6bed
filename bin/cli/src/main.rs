use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Error};
use clap::{Parser, Subcommand};
use log::{error, info};
use loki_client::{AggregateBy, ApiResponse, Config, Direction, LokiClient, LokiService, LokiTimestamp, PrometheusDuration};
use serde::Serialize;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
struct Args {
    // Path to the config.toml file
    #[clap(short, long, value_parser, value_name = "FILE")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

/// Start and end accept epoch nanoseconds, epoch seconds with fraction or RFC3339.
#[derive(clap::Args, Debug)]
struct TimeRange {
    #[clap(long, value_parser)]
    start: Option<LokiTimestamp>,
    #[clap(long, value_parser)]
    end: Option<LokiTimestamp>,
    /// Like 6h or 30d
    #[clap(long, value_parser)]
    since: Option<PrometheusDuration>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Label names of the requested window
    Labels {
        #[clap(long)]
        query: Option<String>,
        #[clap(flatten)]
        range: TimeRange,
    },
    LabelValues {
        label: String,
        #[clap(long)]
        query: Option<String>,
        #[clap(flatten)]
        range: TimeRange,
    },
    /// Label sets of the streams matching the selector
    Streams {
        selector: String,
        #[clap(flatten)]
        range: TimeRange,
    },
    /// Label names over the whole retention
    AllLabels,
    /// Like `logcli series --analyze-labels`
    AnalyzeLabels {
        #[clap(default_value = "")]
        selector: String,
    },
    Stats {
        selector: String,
        #[clap(flatten)]
        range: TimeRange,
    },
    Volume {
        selector: String,
        /// Comma separated
        #[clap(long, value_delimiter = ',')]
        target_labels: Option<Vec<String>>,
        #[clap(long, value_enum)]
        aggregate_by: Option<AggregateByArg>,
    },
    /// Daily volume of the last 30 days
    VolumeRange {
        selector: String,
        #[clap(long, value_delimiter = ',')]
        target_labels: Option<Vec<String>>,
        #[clap(long, value_enum)]
        aggregate_by: Option<AggregateByArg>,
    },
    Patterns {
        selector: String,
        #[clap(long, value_parser)]
        step: Option<PrometheusDuration>,
        #[clap(flatten)]
        range: TimeRange,
    },
    Query {
        logql: String,
        #[clap(long, value_parser)]
        limit: Option<u32>,
        #[clap(long, value_parser)]
        time: Option<LokiTimestamp>,
        #[clap(long, value_enum)]
        direction: Option<DirectionArg>,
    },
    QueryRange {
        logql: String,
        #[clap(long, value_parser)]
        limit: Option<u32>,
        #[clap(long, value_parser)]
        step: Option<PrometheusDuration>,
        #[clap(long, value_parser)]
        interval: Option<PrometheusDuration>,
        #[clap(long, value_enum)]
        direction: Option<DirectionArg>,
        #[clap(flatten)]
        range: TimeRange,
    },
    DeleteRequests,
    BuildInfo,
    Ready,
}

#[derive(clap::ValueEnum, Debug, Copy, Clone)]
enum DirectionArg {
    Forward,
    Backward,
}

impl From<DirectionArg> for Direction {
    fn from(direction: DirectionArg) -> Self {
        match direction {
            DirectionArg::Forward => Direction::Forward,
            DirectionArg::Backward => Direction::Backward,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Copy, Clone)]
enum AggregateByArg {
    Series,
    Labels,
}

impl From<AggregateByArg> for AggregateBy {
    fn from(aggregate_by: AggregateByArg) -> Self {
        match aggregate_by {
            AggregateByArg::Series => AggregateBy::Series,
            AggregateByArg::Labels => AggregateBy::Labels,
        }
    }
}

fn read_config(path: &Path) -> Result<Config, Error> {
    let content = std::fs::read_to_string(path).with_context(|| format!("could not read config file {}", path.display()))?;
    toml::from_str::<Config>(&content).context("could not parse config file")
}

fn init_logging(config: &Config) {
    let log_level = config.debug.as_ref().map(|debug| debug.log_level.as_str()).unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_body<T: Serialize>(response: ApiResponse<T>) -> Result<(), Error> {
    let body = response.into_result()?;
    print_json(&body)
}

async fn run(service: LokiService, command: Command) -> Result<(), Error> {
    let client = service.client();
    match command {
        Command::Labels { query, range } => {
            print_body(client.query_labels(query.as_deref(), range.start, range.end, range.since).await)
        }
        Command::LabelValues { label, query, range } => print_body(
            client.query_label_values(&label, query.as_deref(), range.start, range.end, range.since).await,
        ),
        Command::Streams { selector, range } => {
            print_body(client.query_streams(&selector, range.start, range.end, range.since).await)
        }
        Command::AllLabels => {
            let mut labels: Vec<String> = service.get_all_labels().await.into_iter().collect();
            labels.sort();
            print_json(&labels)
        }
        Command::AnalyzeLabels { selector } => {
            let results = service.analyze_labels(&selector).await;
            info!("Found {} streams with {} distinct labels", results.streams.len(), results.labels.len());
            print_json(&results.labels)
        }
        Command::Stats { selector, range } => {
            print_body(client.query_log_statistics(&selector, range.start, range.end, range.since).await)
        }
        Command::Volume { selector, target_labels, aggregate_by } => print_body(
            service.get_log_volume(&selector, target_labels.as_deref(), aggregate_by.map(AggregateBy::from)).await,
        ),
        Command::VolumeRange { selector, target_labels, aggregate_by } => print_body(
            service
                .get_log_volume_range(&selector, target_labels.as_deref(), aggregate_by.map(AggregateBy::from))
                .await,
        ),
        Command::Patterns { selector, step, range } => print_body(
            client.patterns_detection(&selector, range.start, range.end, range.since, step).await,
        ),
        Command::Query { logql, limit, time, direction } => {
            print_body(client.instant_query(&logql, limit, time, direction.map(Direction::from)).await)
        }
        Command::QueryRange { logql, limit, step, interval, direction, range } => print_body(
            client
                .range_query(&logql, range.start, range.end, range.since, limit, step, interval, direction.map(Direction::from))
                .await,
        ),
        Command::DeleteRequests => print_body(client.list_log_deletion_requests().await),
        Command::BuildInfo => print_body(client.get_build_information().await),
        Command::Ready => {
            let ready = client.ready().await.into_result()?;
            println!("{}", ready.trim_end());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match read_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);

    info!("Using loki at {}", config.loki.base_url);
    let service = LokiService::new(LokiClient::new(config.loki));

    match run(service, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
