//! Observable events emitted by index groups

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Index group constructed from configuration
    GroupCreated,
    /// An index name was registered
    IndexRegistered,
    /// Object added to an index
    ObjectAdded,
    /// Object removed from one index
    ObjectRemoved,
    /// Object removed from every index of the group
    ObjectRemovedFromAll,
    /// Object moved to an index
    ObjectMoved,
    /// Membership query answered
    QueryExecuted,
    /// Query rejected before reaching the store
    QueryRejected,
    /// Keys of one index deleted
    IndexFlush,
    /// Keys of the whole group deleted
    GroupFlush,
    /// Store call failed
    StoreUnavailable,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::GroupCreated => "INDEX_GROUP_CREATED",
            Event::IndexRegistered => "INDEX_REGISTERED",
            Event::ObjectAdded => "OBJECT_ADDED",
            Event::ObjectRemoved => "OBJECT_REMOVED",
            Event::ObjectRemovedFromAll => "OBJECT_REMOVED_FROM_ALL",
            Event::ObjectMoved => "OBJECT_MOVED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::IndexFlush => "INDEX_FLUSH",
            Event::GroupFlush => "GROUP_FLUSH",
            Event::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }

    /// Severity the event is logged at
    ///
    /// Per-object mutations and queries are high volume and log at TRACE.
    pub fn severity(&self) -> Severity {
        match self {
            Event::GroupCreated | Event::IndexRegistered | Event::IndexFlush | Event::GroupFlush => {
                Severity::Info
            }
            Event::QueryRejected => Severity::Warn,
            Event::StoreUnavailable => Severity::Error,
            _ => Severity::Trace,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
