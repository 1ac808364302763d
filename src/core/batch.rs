//! Batch run state, cooperative cancellation and multi-file import

use crate::core::element::RecordCodec;
use crate::core::folder::FolderPath;
use crate::core::manager::DbManager;
use crate::core::observer::{ItemRef, OperationObserver};
use crate::core::record::Record;
use crate::error::{Result, StoreError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle of a batch run
///
/// `NotStarted -> Running -> {Completed, Stopped, Failed}`. Only I/O errors
/// lead to `Failed`; per-item failures still end in `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    /// Stop requested; writes made before the stop are kept
    Stopped,
    Failed,
}

impl RunState {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::NotStarted => "not started",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Stopped => "stopped",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Shared "stop requested" flag, checked between items
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop before its next item
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once a stop was requested
    pub fn check(&self) -> Result<()> {
        if self.is_stop_requested() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Outcome of an import run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub state: RunState,
    pub imported: usize,
    pub failed: usize,
}

/// Imports document files into a manager
///
/// Files are read and decoded with the manager's codec. A file that does not
/// decode is reported and skipped; an I/O error ends the run in `Failed`.
/// Nothing is flushed: call `flush_all` on the manager afterwards.
pub struct Importer<'a, R: Record> {
    manager: &'a DbManager<R>,
    stop: StopHandle,
    state: RunState,
}

impl<'a, R: Record> Importer<'a, R> {
    pub const OPERATION: &'static str = "import";

    pub fn new(manager: &'a DbManager<R>) -> Self {
        Importer {
            manager,
            stop: StopHandle::new(),
            state: RunState::NotStarted,
        }
    }

    /// Share a stop flag with the caller
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Import every document file directly inside `dir`, in name order
    pub fn import_dir(&mut self, dir: &Path, observer: &mut dyn OperationObserver) -> Result<ImportSummary> {
        let extension = self.manager.cache().codec().file_extension();
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
                files.push(path);
            }
        }
        files.sort();
        self.import_files(&files, observer)
    }

    /// Import `files` in order
    ///
    /// # Errors
    ///
    /// `InvalidState` if this importer already ran; the first I/O error
    /// otherwise, after `notify_end` reported `Failed`.
    pub fn import_files(&mut self, files: &[PathBuf], observer: &mut dyn OperationObserver) -> Result<ImportSummary> {
        if self.state != RunState::NotStarted {
            return Err(StoreError::InvalidState(format!(
                "importer is {}, expected not started",
                self.state
            )));
        }

        self.state = RunState::Running;
        observer.notify_start(Self::OPERATION, Some(files.len()));
        info!("Importing {} files", files.len());

        let mut summary = ImportSummary {
            state: RunState::Running,
            imported: 0,
            failed: 0,
        };

        for (index, file) in files.iter().enumerate() {
            if self.stop.is_stop_requested() {
                self.state = RunState::Stopped;
                break;
            }

            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let item = ItemRef::new(index, name.clone());

            match self.import_one(file, &name) {
                Ok(path) => {
                    summary.imported += 1;
                    observer.notify_succeeded(&item.in_folder(path));
                }
                Err(e) if e.is_fatal() => {
                    self.state = RunState::Failed;
                    observer.notify_failed(&item, &e);
                    observer.notify_end(Self::OPERATION, self.state);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Import of {} failed: {}", name, e);
                    summary.failed += 1;
                    observer.notify_failed(&item, &e);
                }
            }
        }

        if self.state == RunState::Running {
            self.state = RunState::Completed;
        }
        summary.state = self.state;
        observer.notify_end(Self::OPERATION, self.state);
        info!(
            "Import {}: {} imported, {} failed",
            self.state, summary.imported, summary.failed
        );
        Ok(summary)
    }

    fn import_one(&self, file: &Path, name: &str) -> Result<FolderPath> {
        let bytes = fs::read(file)?;
        let codec: &dyn RecordCodec = self.manager.cache().codec();
        let document = codec.decode(name, &bytes)?;
        let record = R::from_element(&document.element, self.manager.registry())?;
        if record.identity_key() != document.key {
            return Err(StoreError::decode(
                name,
                format!("document key '{}' does not match record '{}'", document.key, record.identity_key()),
            ));
        }
        self.manager.add(&record)
    }
}
