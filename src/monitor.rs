use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::loot_log::parse_loot_line;
use crate::lookup::{CategoryLookup, PriceLookup};
use crate::stats::{compute_stats, StatsSnapshot};
use crate::tail::{ChangeSignal, LogTail, TailRead};
use crate::window::LootWindow;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub log_path: PathBuf,
    pub window_minutes: u32,
    pub refresh_interval: Duration,
    pub read_from_start: bool,
    pub poll_interval: Duration,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.log_path.as_os_str().is_empty() {
            return Err("Loot log path is required".to_string());
        }

        if self.window_minutes == 0 {
            return Err("Window length must be at least one minute".to_string());
        }

        if self.refresh_interval.is_zero() {
            return Err("Refresh interval must be greater than zero".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("Poll interval must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum MonitorNotification {
    Status(String),
    Error(String),
    Snapshot(StatsSnapshot),
}

pub struct MonitorHandle {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Loot monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The receiver closes once the monitor has stopped or failed.
pub fn start_loot_monitor(
    config: MonitorConfig,
    prices: Arc<dyn PriceLookup>,
    categories: Arc<dyn CategoryLookup>,
) -> Result<(MonitorHandle, mpsc::UnboundedReceiver<MonitorNotification>), String> {
    config.validate()?;

    let (notification_sender, notification_receiver) = mpsc::unbounded_channel();
    let stop_flag = Arc::new(AtomicBool::new(false));
    let driver = TailDriver {
        config,
        prices,
        categories,
        notifications: notification_sender,
        stop_flag: Arc::clone(&stop_flag),
    };

    let handle = thread::Builder::new()
        .name("loot-monitor".to_string())
        .spawn(move || driver.run())
        .map_err(|error| format!("Failed to start loot monitor thread: {error}"))?;

    Ok((
        MonitorHandle {
            stop_flag,
            handle: Some(handle),
        },
        notification_receiver,
    ))
}

struct TailDriver {
    config: MonitorConfig,
    prices: Arc<dyn PriceLookup>,
    categories: Arc<dyn CategoryLookup>,
    notifications: mpsc::UnboundedSender<MonitorNotification>,
    stop_flag: Arc<AtomicBool>,
}

impl TailDriver {
    fn run(self) {
        let log_path = self.config.log_path.clone();
        self.emit_status(format!("Opening loot log '{}'", log_path.display()));

        let mut tail = match LogTail::open(&log_path) {
            Ok(tail) => tail,
            Err(error) => {
                tracing::error!(
                    log_path = %log_path.display(),
                    open_error = %error,
                    "Failed to open loot log"
                );
                self.emit(MonitorNotification::Error(format!(
                    "Cannot open loot log '{}': {error}",
                    log_path.display()
                )));
                return;
            }
        };

        let mut window = LootWindow::new(self.config.window_minutes);
        let keep_running = if self.config.read_from_start {
            self.load_history(&mut tail, &mut window)
        } else {
            self.skip_history(&mut tail)
        };

        if keep_running {
            self.tail_live(&mut tail, &mut window);
        }

        drop(tail);
        tracing::info!(log_path = %log_path.display(), "Loot monitor stopped");
        self.emit_status("Live monitoring stopped");
    }

    fn load_history(&self, tail: &mut LogTail, window: &mut LootWindow) -> bool {
        self.emit_status("Loading loot history");

        let mut matched_count = 0_u64;
        loop {
            if self.should_stop() {
                return false;
            }

            match tail.next_line() {
                Ok(TailRead::Line(line)) => {
                    if let Some(event) = parse_loot_line(&line) {
                        window.push(event);
                        matched_count += 1;
                    }
                }
                Ok(TailRead::Idle) => break,
                Ok(TailRead::Truncated) => {
                    tracing::warn!("Loot log truncated while loading history");
                }
                Err(error) => {
                    tracing::warn!(
                        log_path = %self.config.log_path.display(),
                        read_error = %error,
                        "Stopped loading loot history early"
                    );
                    break;
                }
            }
        }

        tracing::info!(
            matched_count,
            window_size = window.len(),
            bytes_read = tail.offset(),
            "Loaded loot history"
        );
        self.emit_snapshot(window);
        self.emit_status(format!("Loaded {matched_count} loot events from history"))
    }

    fn skip_history(&self, tail: &mut LogTail) -> bool {
        match tail.seek_to_end() {
            Ok(offset) => {
                tracing::debug!(offset, "Skipping existing loot log content");
            }
            Err(error) => {
                tracing::warn!(
                    log_path = %self.config.log_path.display(),
                    seek_error = %error,
                    "Failed to seek to end of loot log; reading from start"
                );
            }
        }

        true
    }

    fn tail_live(&self, tail: &mut LogTail, window: &mut LootWindow) {
        if !self.emit_status("Live monitoring started") {
            return;
        }

        let change_signal = ChangeSignal::watch(&self.config.log_path);
        let mut last_refresh = Instant::now();

        while !self.should_stop() {
            match tail.next_line() {
                Ok(TailRead::Line(line)) => {
                    if let Some(event) = parse_loot_line(&line) {
                        window.record(event);
                    }
                }
                Ok(TailRead::Idle) => change_signal.wait(self.config.poll_interval),
                Ok(TailRead::Truncated) => {
                    tracing::warn!(
                        log_path = %self.config.log_path.display(),
                        "Loot log truncated; reading from start"
                    );
                    if !self.emit_status("Loot log truncated; reading from start") {
                        return;
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        log_path = %self.config.log_path.display(),
                        read_error = %error,
                        "Failed to read loot log; retrying"
                    );
                    change_signal.wait(self.config.poll_interval);
                }
            }

            if last_refresh.elapsed() >= self.config.refresh_interval {
                last_refresh = Instant::now();
                if !self.emit_snapshot(window) {
                    return;
                }
            }
        }
    }

    fn should_stop(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    // Returns `false` once the consumer is gone.
    fn emit_snapshot(&self, window: &LootWindow) -> bool {
        let mut snapshot = None;
        self.prices.visit_prices(&mut |prices: &dyn PriceLookup| {
            self.categories
                .visit_categories(&mut |categories: &dyn CategoryLookup| {
                    snapshot = compute_stats(window.events(), prices, categories);
                });
        });

        match snapshot {
            Some(snapshot) => self.emit(MonitorNotification::Snapshot(snapshot)),
            None => true,
        }
    }

    fn emit_status(&self, message: impl Into<String>) -> bool {
        self.emit(MonitorNotification::Status(message.into()))
    }

    fn emit(&self, notification: MonitorNotification) -> bool {
        if self.notifications.send(notification).is_err() {
            tracing::debug!("Loot monitor notification receiver dropped");
            self.stop_flag.store(true, Ordering::SeqCst);
            return false;
        }

        true
    }
}
