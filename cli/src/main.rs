//! CLI entrypoint for voxlink
//!
//! This is the main binary that wires together all layers using
//! dependency injection, then runs one session against the simulated
//! backend: log in, join, talk, page history, leave.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use voxlink_application::{
    ChannelSession, ClientRuntime, ConnectOptions, LoginOptions, LoginSession, NoProtocolLogger,
    ProtocolLogger, SpatialPosition,
};
use voxlink_domain::{AccountId, ChannelId, ChannelType, ConnectionState, HistoryFilter};
use voxlink_infrastructure::{
    ConfigLoader, FileConfig, JsonlProtocolLogger, SimulatedBackend, StaticTokenProvider,
};
use voxlink_presentation::{ActivityPrinter, Cli, ConsoleFormatter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    if cli.no_color {
        ConsoleFormatter::set_color(false);
    }

    if cli.show_config {
        println!("Configuration sources (in priority order):");
        for line in ConfigLoader::describe_sources(cli.config.as_ref()) {
            println!("  {}", line);
        }
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("failed to load configuration")?
    };
    let problems = config.validate();
    if !problems.is_empty() {
        let listed: Vec<_> = problems.iter().map(|p| format!("  - {}", p)).collect();
        bail!("invalid configuration:\n{}", listed.join("\n"));
    }

    info!("Starting voxlink");

    let account = AccountId::new(
        &config.backend.issuer,
        &cli.account,
        &config.backend.domain,
        None,
    )
    .context("invalid account name")?;
    let kind = if cli.positional {
        ChannelType::Positional
    } else {
        ChannelType::NonPositional
    };
    let channel_id = ChannelId::new(&config.backend.issuer, &cli.channel, &config.backend.domain, kind)
        .context("invalid channel name")?;

    // === Dependency Injection ===
    let backend = Arc::new(SimulatedBackend::new(config.backend.to_options()));
    let runtime = ClientRuntime::builder(backend)
        .with_token_provider(Arc::new(StaticTokenProvider::new(&config.backend.token_key)))
        .with_protocol_logger(protocol_logger(&cli, &config))
        .with_config(config.client.to_client_config())
        .build();
    runtime.start();

    let printer = ActivityPrinter::new(cli.output);
    let cancel = CancellationToken::new();
    let session = runtime.login_session(&account);
    let mut printers = vec![printer.follow_login(&session, cancel.child_token())];

    let outcome = run_session(&cli, &printer, &session, &channel_id, &cancel, &mut printers).await;
    if let Err(e) = &outcome {
        printer.print(&printer.formatter().error("session", e));
    }

    runtime.shutdown().await;
    cancel.cancel();
    for handle in printers {
        if let Err(e) = handle.await {
            warn!("Printer task failed: {}", e);
        }
    }
    outcome
}

/// Initialize logging based on verbosity level.
///
/// With `--log-file` the output goes through a non-blocking file writer;
/// the returned guard must live until exit so buffered lines are flushed.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("log file path {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("could not create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir, file_name,
    ));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

fn protocol_logger(cli: &Cli, config: &FileConfig) -> Arc<dyn ProtocolLogger> {
    let path = cli
        .protocol_log
        .clone()
        .or_else(|| config.logging.protocol_log.as_ref().map(PathBuf::from));
    match path.and_then(JsonlProtocolLogger::new) {
        Some(logger) => {
            info!("Protocol log: {}", logger.path().display());
            Arc::new(logger)
        }
        None => Arc::new(NoProtocolLogger),
    }
}

async fn run_session(
    cli: &Cli,
    printer: &ActivityPrinter,
    session: &Arc<LoginSession>,
    channel_id: &ChannelId,
    cancel: &CancellationToken,
    printers: &mut Vec<tokio::task::JoinHandle<()>>,
) -> Result<()> {
    let mut options = LoginOptions::default();
    if let Some(name) = &cli.display_name {
        options = options.with_display_name(name);
    }
    session.login(options).await.context("login failed")?;

    let channel = session.channel(channel_id);
    printers.push(printer.follow_channel(&channel, cancel.child_token()));

    let connect = if cli.text_only {
        ConnectOptions::text_only()
    } else if cli.audio_only {
        ConnectOptions::audio_only()
    } else {
        ConnectOptions::default()
    };
    channel
        .connect(connect)
        .await
        .with_context(|| format!("could not join {}", channel_id))?;

    talk(cli, printer, &channel).await?;

    channel.disconnect().await.context("leaving the channel failed")?;
    session.logout().await.context("logout failed")?;
    Ok(())
}

async fn talk(cli: &Cli, printer: &ActivityPrinter, channel: &Arc<ChannelSession>) -> Result<()> {
    let formatter = printer.formatter();
    printer.print(&formatter.roster(channel.channel(), &channel.participants()));

    let audio = channel.audio_state() == ConnectionState::Connected;
    let text = channel.text_state() == ConnectionState::Connected;

    if audio && cli.transcribe {
        channel
            .set_transcription(true, None)
            .await
            .context("could not enable transcription")?;
    }
    if audio && channel.channel().is_positional() {
        channel.set_position(SpatialPosition::at([0.0, 0.0, 0.0]))?;
    }

    if text {
        for message in &cli.message {
            channel
                .send_message(message.as_str(), None)
                .await
                .context("sending a message failed")?;
        }

        if cli.history > 0 {
            let filter = HistoryFilter {
                search_text: cli.search.clone(),
                ..HistoryFilter::default()
            };
            let history = channel
                .fetch_history(cli.history, filter)
                .await
                .context("fetching history failed")?;
            printer.print(&formatter.history(channel.channel(), &history));
        }
    } else if !cli.message.is_empty() || cli.search.is_some() {
        warn!("Text stream not connected; skipping messages and history");
    }
    Ok(())
}
