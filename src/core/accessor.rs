//! Forward-only cursor over one folder's records

use crate::core::cache::SharedFolder;
use crate::core::folder::{FolderPath, UnreadableDocument};
use crate::core::record::{NegativeMode, Record, StarRegistry};
use crate::error::{Result, StoreError};
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Slot {
    Key(String),
    Unreadable(UnreadableDocument),
}

/// Cursor over the records of a folder
///
/// The set of keys is fixed when the accessor is created; records are
/// decoded one at a time as the cursor moves, from the cached folder. A key
/// removed after creation is skipped. Unreadable documents come last, each
/// as one `Decode` error, after which the cursor has already moved on, so a
/// loop can report the error and keep reading.
///
/// Once the end is reached every further call returns `Ok(None)`.
///
/// An accessor holds a single cursor and is neither `Sync` nor meant to be
/// shared; open one per thread.
pub struct Accessor<R: Record> {
    path: FolderPath,
    folder: SharedFolder,
    registry: Arc<StarRegistry>,
    mode: NegativeMode,
    slots: Vec<Slot>,
    position: usize,
    last_visited: Option<String>,
    _marker: PhantomData<(R, Cell<()>)>,
}

impl<R: Record> Accessor<R> {
    pub fn new(
        path: FolderPath,
        folder: SharedFolder,
        registry: Arc<StarRegistry>,
        mode: NegativeMode,
    ) -> Self {
        let slots = {
            let guard = folder.read();
            guard
                .keys()
                .map(|k| Slot::Key(k.to_string()))
                .chain(guard.unreadable().iter().cloned().map(Slot::Unreadable))
                .collect()
        };

        Accessor {
            path,
            folder,
            registry,
            mode,
            slots,
            position: 0,
            last_visited: None,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &FolderPath {
        &self.path
    }

    pub fn mode(&self) -> NegativeMode {
        self.mode
    }

    /// Rewind and return the first record
    pub fn get_first_element(&mut self) -> Result<Option<R>> {
        self.position = 0;
        self.get_next_element()
    }

    /// Next record admitted by the negative mode, `Ok(None)` at the end
    pub fn get_next_element(&mut self) -> Result<Option<R>> {
        while let Some(slot) = self.slots.get(self.position) {
            self.position += 1;

            let element = match slot {
                Slot::Key(key) => {
                    self.last_visited = Some(key.clone());
                    match self.folder.read().get(key) {
                        Some(element) => element.clone(),
                        None => continue,
                    }
                }
                Slot::Unreadable(doc) => {
                    self.last_visited = Some(doc.file_name.clone());
                    return Err(StoreError::decode(
                        format!("{}/{}", self.path, doc.file_name),
                        doc.reason.clone(),
                    ));
                }
            };

            let record = R::from_element(&element, &self.registry)?;
            if self.mode.admits(&record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Key or file name of the slot the cursor last visited
    ///
    /// Names the item behind an error returned by the cursor.
    pub fn last_visited(&self) -> Option<&str> {
        self.last_visited.as_deref()
    }

    /// Slots left to visit, including ones the mode will skip
    pub fn remaining(&self) -> usize {
        self.slots.len().saturating_sub(self.position)
    }
}

impl<R: Record> Iterator for Accessor<R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next_element().transpose()
    }
}

impl<R: Record> std::fmt::Debug for Accessor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessor")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("position", &self.position)
            .field("len", &self.slots.len())
            .finish()
    }
}
