//! Progress reporting for listings and batch runs
//!
//! Operations report per-item outcomes through an [`OperationObserver`]
//! instead of failing as a whole, so a caller can render every failed item
//! with its folder path and name. Free-form log lines go to a [`Monitor`].

use crate::core::batch::RunState;
use crate::core::folder::FolderPath;
use crate::error::StoreError;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use tracing::{debug, info};

/// Identifies one item of an operation in reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    /// Zero-based position in the operation's input
    pub index: usize,
    /// Record identity, designation or file name
    pub name: String,
    /// Folder the item lives in, when known
    pub path: Option<FolderPath>,
}

impl ItemRef {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        ItemRef {
            index,
            name: name.into(),
            path: None,
        }
    }

    pub fn in_folder(mut self, path: FolderPath) -> Self {
        self.path = Some(path);
        self
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "#{} {} in {}", self.index, self.name, path),
            None => write!(f, "#{} {}", self.index, self.name),
        }
    }
}

/// Receives operation progress; every method defaults to doing nothing
pub trait OperationObserver: Send {
    fn notify_start(&mut self, _operation: &str, _total: Option<usize>) {}

    fn notify_end(&mut self, _operation: &str, _state: RunState) {}

    fn notify_succeeded(&mut self, _item: &ItemRef) {}

    fn notify_failed(&mut self, _item: &ItemRef, _error: &StoreError) {}

    /// Item processed without error but with a noteworthy outcome
    fn notify_warned(&mut self, _item: &ItemRef, _message: &str) {}
}

/// Ignores every event
impl OperationObserver for () {}

impl<O: OperationObserver + ?Sized> OperationObserver for &mut O {
    fn notify_start(&mut self, operation: &str, total: Option<usize>) {
        (**self).notify_start(operation, total)
    }

    fn notify_end(&mut self, operation: &str, state: RunState) {
        (**self).notify_end(operation, state)
    }

    fn notify_succeeded(&mut self, item: &ItemRef) {
        (**self).notify_succeeded(item)
    }

    fn notify_failed(&mut self, item: &ItemRef, error: &StoreError) {
        (**self).notify_failed(item, error)
    }

    fn notify_warned(&mut self, item: &ItemRef, message: &str) {
        (**self).notify_warned(item, message)
    }
}

/// One observer callback, as data
#[derive(Debug, Clone, PartialEq)]
pub enum OperationEvent {
    Started {
        operation: String,
        total: Option<usize>,
    },
    Succeeded(ItemRef),
    Failed {
        item: ItemRef,
        error: String,
    },
    Warned {
        item: ItemRef,
        message: String,
    },
    Ended {
        operation: String,
        state: RunState,
    },
}

fn event_for_start(operation: &str, total: Option<usize>) -> OperationEvent {
    OperationEvent::Started {
        operation: operation.to_string(),
        total,
    }
}

/// Records every event in order
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<OperationEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[OperationEvent] {
        &self.events
    }

    pub fn succeeded(&self) -> usize {
        self.count(|e| matches!(e, OperationEvent::Succeeded(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|e| matches!(e, OperationEvent::Failed { .. }))
    }

    pub fn warned(&self) -> usize {
        self.count(|e| matches!(e, OperationEvent::Warned { .. }))
    }

    /// Items reported as failed, in report order
    pub fn failed_items(&self) -> Vec<&ItemRef> {
        self.events
            .iter()
            .filter_map(|e| match e {
                OperationEvent::Failed { item, .. } => Some(item),
                _ => None,
            })
            .collect()
    }

    /// State of the last `Ended` event
    pub fn final_state(&self) -> Option<RunState> {
        self.events.iter().rev().find_map(|e| match e {
            OperationEvent::Ended { state, .. } => Some(*state),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&OperationEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl OperationObserver for EventLog {
    fn notify_start(&mut self, operation: &str, total: Option<usize>) {
        self.events.push(event_for_start(operation, total));
    }

    fn notify_end(&mut self, operation: &str, state: RunState) {
        self.events.push(OperationEvent::Ended {
            operation: operation.to_string(),
            state,
        });
    }

    fn notify_succeeded(&mut self, item: &ItemRef) {
        self.events.push(OperationEvent::Succeeded(item.clone()));
    }

    fn notify_failed(&mut self, item: &ItemRef, error: &StoreError) {
        self.events.push(OperationEvent::Failed {
            item: item.clone(),
            error: error.to_string(),
        });
    }

    fn notify_warned(&mut self, item: &ItemRef, message: &str) {
        self.events.push(OperationEvent::Warned {
            item: item.clone(),
            message: message.to_string(),
        });
    }
}

/// Forwards events to another thread
///
/// Events sent after the receiver is gone are dropped.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<OperationEvent>,
}

impl ChannelObserver {
    /// Observer plus the receiving end of its unbounded channel
    pub fn new() -> (Self, Receiver<OperationEvent>) {
        let (sender, receiver) = channel::unbounded();
        (ChannelObserver { sender }, receiver)
    }

    pub fn from_sender(sender: Sender<OperationEvent>) -> Self {
        ChannelObserver { sender }
    }

    fn send(&self, event: OperationEvent) {
        if self.sender.send(event).is_err() {
            debug!("Observer channel closed, dropping event");
        }
    }
}

impl OperationObserver for ChannelObserver {
    fn notify_start(&mut self, operation: &str, total: Option<usize>) {
        self.send(event_for_start(operation, total));
    }

    fn notify_end(&mut self, operation: &str, state: RunState) {
        self.send(OperationEvent::Ended {
            operation: operation.to_string(),
            state,
        });
    }

    fn notify_succeeded(&mut self, item: &ItemRef) {
        self.send(OperationEvent::Succeeded(item.clone()));
    }

    fn notify_failed(&mut self, item: &ItemRef, error: &StoreError) {
        self.send(OperationEvent::Failed {
            item: item.clone(),
            error: error.to_string(),
        });
    }

    fn notify_warned(&mut self, item: &ItemRef, message: &str) {
        self.send(OperationEvent::Warned {
            item: item.clone(),
            message: message.to_string(),
        });
    }
}

/// Sink for human-readable log lines of a batch run
pub trait Monitor: Send + Sync {
    fn add_message(&self, line: &str);
}

/// Forwards lines to `tracing` at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitor;

impl Monitor for TracingMonitor {
    fn add_message(&self, line: &str) {
        info!(target: "stardb_rs::monitor", "{}", line);
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemoryMonitor {
    lines: Mutex<Vec<String>>,
}

impl MemoryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Monitor for MemoryMonitor {
    fn add_message(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
