//! Shared timestamp/event helpers for audit records and log spans.

use ulid::Ulid;

/// Local wall-clock stamp used as the first line of every audit record.
pub fn now_local_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}
