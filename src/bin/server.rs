use clap::Parser;
use notify_relay::bot::BotService;
use notify_relay::notifications::senders::NotificationSender;
use notify_relay::notifications::senders::telegram::TelegramSender;
use notify_relay::server::config::ServerConfig;
use notify_relay::store::{SharedUserStore, UserStore};
use notify_relay::web::{AppState, create_axum_router};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &Path) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "relay.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info` if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_addr = %config.listen_addr,
        data_file = %config.data_file.display(),
        "Starting notification relay."
    );

    let store = match UserStore::load(&config.data_file) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Failed to load user store.");
            return Err(e.into());
        }
    };
    let store: SharedUserStore = Arc::new(Mutex::new(store));

    let telegram = TelegramSender::new(
        config.telegram_api_url.clone(),
        config.telegram_api_token.clone(),
        config.send_timeout,
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bot = BotService::new(telegram.clone(), store.clone(), config.poll_timeout);
    let bot_task = tokio::spawn(bot.run(shutdown_rx.clone()));

    let router = create_axum_router(AppState {
        store,
        sender: Arc::new(telegram) as Arc<dyn NotificationSender>,
    });

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(address = %config.listen_addr, "HTTP server listening.");

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received.");
        let _ = shutdown_tx.send(true);
    });

    let mut http_shutdown = shutdown_rx;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = http_shutdown.changed().await;
        })
        .await?;

    if let Err(e) = bot_task.await {
        error!(error = %e, "Bot task ended abnormally.");
    }

    info!("Shutdown complete.");
    Ok(())
}
