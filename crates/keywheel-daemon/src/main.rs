use clap::Parser;
use keywheel_daemon::catalog::DirectorySource;
use keywheel_daemon::host::{spawn_line_reader, HostCommand, HostSession};
use keywheel_daemon::ipc::{CommandLauncher, NoLauncher, PeerLauncher, SystemClock};
use keywheel_daemon::track::LoftyTagReader;
use keywheel_daemon::BrowserService;
use keywheel_proto::config::Config;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "keywheel")]
#[command(about = "Browse a music library by key and tempo", long_about = None)]
struct Args {
    /// Config file (default: ~/.config/keywheel/config.toml)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Don't launch the UI process; wait for one started separately
    #[arg(long)]
    no_ui: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = keywheel_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("keywheel.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,keywheel_daemon=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!(
        "Config loaded from: {:?}",
        args.config.clone().unwrap_or_else(Config::config_path)
    );

    let source = DirectorySource::open(&config.library, config.host.preview_command.clone())?;
    info!("Library root: {:?}", config.library.base_dir);

    let mut launcher: Box<dyn PeerLauncher> = match config.ui.resolve_command() {
        Some(program) if !args.no_ui => Box::new(CommandLauncher::new(program, config.ui.args.clone())),
        Some(_) => Box::new(NoLauncher),
        None => {
            if !args.no_ui {
                warn!("No UI command configured and keywheel-ui not found; waiting for an external UI");
            }
            Box::new(NoLauncher)
        }
    };

    let service = BrowserService::new(
        source,
        Box::new(LoftyTagReader),
        &config,
        launcher.as_mut(),
        &SystemClock,
    )?;
    let mut session = HostSession::new(service);

    let mut tick = tokio::time::interval(Duration::from_millis(config.host.tick_ms.max(1)));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    let mut stdin_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Browser running");
    loop {
        tokio::select! {
            _ = tick.tick() => {
                session.service_mut().poll();
            }

            line = lines.recv(), if stdin_open => {
                match line {
                    Some(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match line.parse::<HostCommand>() {
                            Ok(cmd) => {
                                if !session.handle(cmd) {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Ignoring host input {:?}: {}", line, e);
                                eprintln!("{}", e);
                            }
                        }
                    }
                    None => {
                        info!("stdin closed; still serving the UI until interrupted");
                        stdin_open = false;
                    }
                }
            }

            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    session.shutdown();
    drop(launcher);
    info!("Browser stopped");
    Ok(())
}
