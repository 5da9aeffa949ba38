//! Binary entry point for `hookbot`.
//!
//! This module provides the command-line interface for hookbot with options
//! for configuration file paths and logging verbosity. It initializes the
//! necessary components and starts either the bot or the webhook receiver.

use clap::{Parser, Subcommand};
use hookbot::base::{config::Config, types::Void};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Hookbot – announces webhook events on IRC.
///
/// Configuration can come from `hookbot.toml` or `HOOKBOT_*` environment variables.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, the bot will look for `hookbot.toml` (or `.yaml`, `.json`)
    /// in the current directory.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Export spans over OTLP/HTTP.
    #[arg(long, global = true)]
    otlp: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
    /// Connect to IRC and announce events from the bus (default).
    #[default]
    Bot,
    /// Serve the webhook endpoint and publish deliveries to the bus.
    Receiver,
}

/// Main entry point for the hookbot binary.
///
/// Sets up logging based on verbosity, loads configuration, and starts the selected service.
#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stdout = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer.

    let otel = if args.otlp {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("hookbot");
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    let config = Config::load(args.config.as_deref())?;

    match args.command.unwrap_or_default() {
        Command::Bot => hookbot::start(config).await,
        Command::Receiver => hookbot::receive(config).await,
    }
}
