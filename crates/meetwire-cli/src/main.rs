//! meetwire command-line client
//!
//! Runs the session lifecycle controller against the in-process loopback SDK:
//! 1. Validates configuration (a placeholder access token stops here)
//! 2. Registers the device
//! 3. Reads `join <destination>` / `hangup` / `quit` from stdin
//! 4. Prints every session event as it happens

mod input;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use meetwire_core::{
    logging::parse_log_level, setup_logging, ClientConfig, ClientConfigBuilder, EventStream,
    JoinStrategyKind, LoggingConfig, LoopbackService, MemorySurfaces, SdkFailure, SdkOp,
    SessionEvent, SessionLifecycleController, SurfaceName, UserCommand,
};

use crate::input::{parse_line, InputLine, HELP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    /// get_media_streams, join, add_media
    StreamPair,
    /// Open microphone and camera, then join with them
    DeviceStream,
}

impl From<StrategyArg> for JoinStrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::StreamPair => JoinStrategyKind::StreamPair,
            StrategyArg::DeviceStream => JoinStrategyKind::DeviceStream,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Meeting client driving the meetwire session coordinator", long_about = None)]
struct Args {
    /// Access token for the conferencing SDK
    #[arg(long, env = "MEETWIRE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Join strategy (overrides the configuration file)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Join this destination immediately after registering
    #[arg(short, long)]
    destination: Option<String>,

    /// Log level for this client
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Simulated SDK latency in milliseconds
    #[arg(long, default_value = "0")]
    latency_ms: u64,

    /// Make the loopback SDK refuse camera access
    #[arg(long)]
    deny_camera: bool,

    /// Make the loopback SDK refuse device registration
    #[arg(long)]
    fail_registration: bool,
}

impl Args {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let base = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };

        let mut builder = ClientConfigBuilder::from_config(base);
        if let Some(token) = &self.access_token {
            builder = builder.access_token(token.clone());
        }
        if let Some(strategy) = self.strategy {
            builder = builder.join_strategy(strategy.into());
        }
        Ok(builder.build()?)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::new(parse_log_level(&args.log_level)?);
    if args.json_logs {
        logging = logging.with_json();
    }
    setup_logging(&logging)?;

    let config = args.client_config().context("configuration rejected")?;
    info!("Using {} join strategy", config.join_strategy);

    let service = LoopbackService::new(config.sdk_settings())
        .with_latency(Duration::from_millis(args.latency_ms));
    if args.deny_camera {
        service.deny_camera();
    }
    if args.fail_registration {
        service.fail(
            SdkOp::Register,
            SdkFailure::new("AuthError", "registration refused by loopback"),
        );
    }

    let surfaces = MemorySurfaces::new();
    let mut controller =
        SessionLifecycleController::new(&config, Arc::new(service), surfaces.binder())?;
    let printer = tokio::spawn(print_events(controller.events()));

    controller
        .initialize()
        .await
        .context("device registration failed")?;

    let (commands, receiver) = mpsc::channel(16);
    if let Some(destination) = args.destination.clone() {
        commands.send(UserCommand::Join(destination)).await?;
    }
    std::thread::spawn(move || read_commands(commands));

    println!("{HELP}");
    controller.run(receiver).await?;

    for name in SurfaceName::ALL {
        if surfaces.get(name).is_populated() {
            warn!("Surface {} still populated after shutdown", name);
        }
    }
    drop(controller);
    let _ = printer.await;
    Ok(())
}

/// Forward stdin lines to the controller until EOF or `quit`. Runs on its
/// own thread so a pending read never holds up runtime shutdown.
fn read_commands(commands: mpsc::Sender<UserCommand>) {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            Ok(InputLine::Command(command)) => {
                let stop = command == UserCommand::Shutdown;
                if commands.blocking_send(command).is_err() || stop {
                    break;
                }
            }
            Ok(InputLine::Help) => println!("{HELP}"),
            Ok(InputLine::Empty) => {}
            Err(message) => println!("{message}"),
        }
    }
}

async fn print_events(mut events: EventStream) {
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => println!("{}", describe(&event)),
            Err(e) => warn!("Event stream lagged: {}", e),
        }
    }
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Registered => "registered".to_string(),
        SessionEvent::RegistrationFailed { reason } => format!("registration failed: {reason}"),
        SessionEvent::Deregistered => "deregistered".to_string(),
        SessionEvent::SessionCreated {
            session_id,
            destination,
        } => format!("[{session_id}] meeting created for {destination}"),
        SessionEvent::StateChanged {
            session_id,
            from,
            to,
        } => format!("[{session_id}] {from} -> {to}"),
        SessionEvent::SurfaceAttached { category, surface } => {
            format!("{category} shown on {surface}")
        }
        SessionEvent::SurfaceDetached { category, surface } => {
            format!("{category} removed from {surface}")
        }
        SessionEvent::SessionFailed {
            session_id: Some(id),
            stage,
            message,
        } => format!("[{id}] failed during {stage}: {message}"),
        SessionEvent::SessionFailed {
            session_id: None,
            stage,
            message,
        } => format!("failed during {stage}: {message}"),
        SessionEvent::SdkError {
            session_id,
            message,
        } => format!("[{session_id}] sdk error: {message}"),
        SessionEvent::SessionEnded { session_id } => format!("[{session_id}] left"),
        SessionEvent::Notice { message } => message.clone(),
    }
}
