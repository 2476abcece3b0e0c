use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TailRead {
    Line(String),
    Idle,
    Truncated,
}

// Bytes after the last newline stay in `pending` until the line is complete.
pub(crate) struct LogTail {
    reader: BufReader<File>,
    offset: u64,
    pending: Vec<u8>,
}

impl LogTail {
    pub(crate) fn open(path: &Path) -> Result<Self, String> {
        let file = File::open(path).map_err(|error| error.to_string())?;
        let metadata = file.metadata().map_err(|error| error.to_string())?;
        if !metadata.is_file() {
            return Err("Not a regular file".to_string());
        }

        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
            pending: Vec::new(),
        })
    }

    pub(crate) fn seek_to_end(&mut self) -> Result<u64, String> {
        let end_offset = self
            .reader
            .seek(SeekFrom::End(0))
            .map_err(|error| error.to_string())?;
        self.offset = end_offset;
        self.pending.clear();
        Ok(end_offset)
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn next_line(&mut self) -> Result<TailRead, String> {
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut self.pending)
            .map_err(|error| error.to_string())?;
        self.offset = self.offset.saturating_add(bytes_read as u64);

        if self.pending.last() == Some(&b'\n') {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            return Ok(TailRead::Line(line));
        }

        if bytes_read == 0 && self.was_truncated()? {
            self.rewind()?;
            return Ok(TailRead::Truncated);
        }

        Ok(TailRead::Idle)
    }

    fn was_truncated(&self) -> Result<bool, String> {
        let file_length = self
            .reader
            .get_ref()
            .metadata()
            .map_err(|error| error.to_string())?
            .len();
        Ok(file_length < self.offset)
    }

    fn rewind(&mut self) -> Result<(), String> {
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|error| error.to_string())?;
        self.offset = 0;
        self.pending.clear();
        Ok(())
    }
}

pub(crate) struct ChangeSignal {
    _watcher: Option<RecommendedWatcher>,
    receiver: mpsc::Receiver<()>,
}

impl ChangeSignal {
    pub(crate) fn watch(log_path: &Path) -> Self {
        let (sender, receiver) = mpsc::channel();
        let watcher = match create_log_watcher(log_path, sender) {
            Ok(watcher) => Some(watcher),
            Err(error) => {
                tracing::warn!(
                    log_path = %log_path.display(),
                    watch_error = %error,
                    "Falling back to timed polling for loot log"
                );
                None
            }
        };

        Self {
            _watcher: watcher,
            receiver,
        }
    }

    pub(crate) fn wait(&self, timeout: Duration) {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) => while self.receiver.try_recv().is_ok() {},
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => std::thread::sleep(timeout),
        }
    }
}

fn create_log_watcher(
    log_path: &Path,
    sender: mpsc::Sender<()>,
) -> Result<RecommendedWatcher, String> {
    let watched_path = log_path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) => {
                if touches_log_file(&event, &watched_path) && sender.send(()).is_err() {
                    tracing::debug!("Loot log change receiver dropped");
                }
            }
            Err(error) => {
                tracing::debug!("Loot log watcher error: {error}");
            }
        }
    })
    .map_err(|error| error.to_string())?;

    let watch_directory = watch_directory_for(log_path);
    watcher
        .watch(&watch_directory, RecursiveMode::NonRecursive)
        .map_err(|error| error.to_string())?;

    Ok(watcher)
}

fn watch_directory_for(log_path: &Path) -> PathBuf {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// Events may carry absolute paths while the configured path is relative, so
// the file name alone also counts as a match.
fn touches_log_file(event: &Event, log_path: &Path) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }

    let log_file_name = log_path.file_name();
    log_file_name.is_some()
        && event
            .paths
            .iter()
            .any(|changed_path| {
                changed_path == log_path || changed_path.file_name() == log_file_name
            })
}
