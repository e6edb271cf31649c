// Import Queue Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Field separator inside one persisted queue line (`path|owner`)
pub const FIELD_SEPARATOR: char = '|';

/// Line separator between persisted queue items
pub const LINE_SEPARATOR: char = '\n';

/// One file waiting to be imported.
///
/// Identity is `source_path`: the queue never holds two items with the same path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    source_path: String,
    owner_id: String,
}

impl QueueItem {
    /// Build a queue item, rejecting paths the line format cannot carry.
    pub fn new(source_path: impl Into<String>, owner_id: impl Into<String>) -> Result<Self> {
        let source_path = source_path.into();
        let owner_id = owner_id.into();

        if source_path.is_empty() {
            return Err(DomainError::InvalidQueueItem("empty source path".to_string()));
        }
        if contains_separator(&source_path) {
            return Err(DomainError::InvalidQueueItem(format!(
                "source path contains a reserved separator: {source_path:?}"
            )));
        }
        if contains_separator(&owner_id) {
            return Err(DomainError::InvalidQueueItem(format!(
                "owner id contains a reserved separator: {owner_id:?}"
            )));
        }

        Ok(Self {
            source_path,
            owner_id,
        })
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Owner id, or `None` when the item was enqueued anonymously
    pub fn owner(&self) -> Option<&str> {
        (!self.owner_id.is_empty()).then_some(self.owner_id.as_str())
    }

    /// Encode as a single persisted line: `path|owner`
    pub fn to_line(&self) -> String {
        format!("{}{}{}", self.source_path, FIELD_SEPARATOR, self.owner_id)
    }

    /// Decode one persisted line.
    ///
    /// Lines with fewer than two fields (or an empty path) yield `None`.
    /// Extra fields beyond the second are ignored.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut fields = line.split(FIELD_SEPARATOR);
        let path = fields.next()?;
        let owner = fields.next()?;

        if path.is_empty() {
            return None;
        }

        Some(Self {
            source_path: path.to_string(),
            owner_id: owner.to_string(),
        })
    }
}

fn contains_separator(value: &str) -> bool {
    value.contains(FIELD_SEPARATOR) || value.contains(LINE_SEPARATOR) || value.contains('\r')
}

/// Durable part of the import queue: pending items in FIFO order plus the
/// "is processing" flag. The in-flight item is never part of this state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueState {
    pub items: VecDeque<QueueItem>,
    pub processing: bool,
}

impl QueueState {
    pub fn new(items: impl IntoIterator<Item = QueueItem>, processing: bool) -> Self {
        Self {
            items: items.into_iter().collect(),
            processing,
        }
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.items.iter().any(|item| item.source_path == path)
    }

    /// Append unless an item with the same path is already queued.
    /// Returns `true` when the item was added.
    pub fn push_unique(&mut self, item: QueueItem) -> bool {
        if self.contains_path(&item.source_path) {
            return false;
        }
        self.items.push_back(item);
        true
    }

    pub fn paths(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| item.source_path.clone())
            .collect()
    }

    /// Serialize the item list: one `path|owner` line per item, joined by newline
    pub fn encode_items(&self) -> String {
        self.items
            .iter()
            .map(QueueItem::to_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse a serialized item list, silently dropping malformed lines
    pub fn decode_items(raw: &str) -> VecDeque<QueueItem> {
        raw.split(LINE_SEPARATOR)
            .filter(|line| !line.is_empty())
            .filter_map(QueueItem::from_line)
            .collect()
    }
}
