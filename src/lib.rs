pub mod loot_log;
pub mod lookup;
pub mod monitor;
pub mod settings;
pub mod stats;
mod tail;
pub mod window;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

pub use loot_log::{parse_loot_line, LootEvent};
pub use lookup::{CategoryLookup, PriceLookup, SharedCategoryTable, SharedPriceTable};
pub use monitor::{start_loot_monitor, MonitorConfig, MonitorHandle, MonitorNotification};
pub use stats::{compute_stats, ItemStats, StatsSnapshot};
pub use window::LootWindow;

const DEFAULT_SETTINGS_PATH: &str = "loot_monitor.json";

/// Prints every notification to stdout as one JSON line until Ctrl-C.
pub fn run() -> Result<(), String> {
    init_tracing();

    let settings_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
    let settings = settings::load_settings(&settings_path)?;
    let config = settings.to_config()?;

    tracing::info!(
        log_path = %config.log_path.display(),
        window_minutes = config.window_minutes,
        refresh_secs = config.refresh_interval.as_secs(),
        read_from_start = config.read_from_start,
        price_count = settings.prices.len(),
        category_count = settings.categories.len(),
        "Starting loot monitor"
    );

    let prices = SharedPriceTable::new(settings.prices);
    let categories = SharedCategoryTable::new(settings.categories);
    let (handle, receiver) = start_loot_monitor(config, Arc::new(prices), Arc::new(categories))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("Failed to start async runtime: {error}"))?;

    runtime.block_on(forward_notifications(receiver, handle))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("Failed to install tracing subscriber: {error}");
    }
}

async fn forward_notifications(
    mut receiver: UnboundedReceiver<MonitorNotification>,
    handle: MonitorHandle,
) -> Result<(), String> {
    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    let mut stop_requested = false;
    let mut fatal_error: Option<String> = None;

    loop {
        tokio::select! {
            notification = receiver.recv() => {
                let Some(notification) = notification else {
                    break;
                };

                if let MonitorNotification::Error(message) = &notification {
                    fatal_error = Some(message.clone());
                }
                print_notification(&notification)?;
            }
            signal_result = &mut shutdown_signal, if !stop_requested => {
                if let Err(error) = signal_result {
                    tracing::warn!("Failed to listen for Ctrl-C: {error}");
                }
                tracing::info!("Stopping loot monitor");
                handle.stop();
                stop_requested = true;
            }
        }
    }

    handle.join();

    match fatal_error {
        Some(message) => Err(message),
        None => Ok(()),
    }
}

fn print_notification(notification: &MonitorNotification) -> Result<(), String> {
    let serialized = serde_json::to_string(notification)
        .map_err(|error| format!("Failed to serialize notification: {error}"))?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{serialized}").map_err(|error| error.to_string())?;
    stdout.flush().map_err(|error| error.to_string())
}
