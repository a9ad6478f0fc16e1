//! Process-wide queue name registry.
//!
//! A queue name identifies durable state that outlives the process; two
//! live queues with the same name would race over the same stored entries.
//! Names are claimed at construction and never released — queues are
//! expected to live for the rest of the process.

use std::collections::HashSet;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::QueueError;

static ACTIVE_NAMES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Claim `name` for this process.
pub(crate) fn register(name: &str) -> Result<(), QueueError> {
    if name.is_empty() {
        return Err(QueueError::EmptyQueueName);
    }
    let mut names = ACTIVE_NAMES.lock().unwrap();
    if !names.insert(name.to_string()) {
        return Err(QueueError::DuplicateQueueName(name.to_string()));
    }
    Ok(())
}

/// Forget every claimed name.
///
/// Test hook only: production code never unregisters, and calling this
/// while queues are live lets duplicates through.
pub fn reset() {
    ACTIVE_NAMES.lock().unwrap().clear();
}
