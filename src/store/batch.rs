//! Batched store commands
//!
//! A `Batch` is an ordered list of set commands executed by
//! `BackingStore::execute_batch` as one atomic unit. Replies come back in
//! command order, one per command.

use std::collections::BTreeSet;

use super::errors::{StoreError, StoreResult};

/// A single set command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a member to a set. Replies `Bool(changed)`.
    SetAdd { key: String, member: String },
    /// Remove a member from a set. Replies `Bool(changed)`.
    SetRemove { key: String, member: String },
    /// Remove a member from every key matching a glob pattern, resolved
    /// when the batch executes. Replies `Count(sets changed)`.
    SetRemoveMatching { pattern: String, member: String },
    /// Remove a member from every key listed as a member of `list`,
    /// resolved when the batch executes. Replies `Count(sets changed)`.
    SetRemoveListed { list: String, member: String },
    /// Test membership. Replies `Bool(present)`.
    SetIsMember { key: String, member: String },
    /// Read all members. Replies `Members`.
    SetMembers { key: String },
    /// Union of sets. Replies `Members`.
    SetUnion { keys: Vec<String> },
    /// Materialize a union into `dest`. Replies `Count(cardinality)`.
    SetUnionStore { dest: String, keys: Vec<String> },
    /// Intersection of sets. Replies `Members`.
    SetIntersect { keys: Vec<String> },
    /// Delete keys. Replies `Count(deleted)`.
    Delete { keys: Vec<String> },
}

impl Command {
    /// Command name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetAdd { .. } => "SADD",
            Command::SetRemove { .. } => "SREM",
            Command::SetRemoveMatching { .. } => "SREM_MATCHING",
            Command::SetRemoveListed { .. } => "SREM_LISTED",
            Command::SetIsMember { .. } => "SISMEMBER",
            Command::SetMembers { .. } => "SMEMBERS",
            Command::SetUnion { .. } => "SUNION",
            Command::SetUnionStore { .. } => "SUNIONSTORE",
            Command::SetIntersect { .. } => "SINTER",
            Command::Delete { .. } => "DEL",
        }
    }
}

/// Reply to a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Bool(bool),
    Count(usize),
    Members(BTreeSet<String>),
}

impl Reply {
    /// Reply shape name, for errors
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Bool(_) => "bool",
            Reply::Count(_) => "count",
            Reply::Members(_) => "members",
        }
    }

    /// Interpret as a boolean reply
    pub fn into_bool(self) -> StoreResult<bool> {
        match self {
            Reply::Bool(b) => Ok(b),
            other => Err(StoreError::UnexpectedReply {
                expected: "bool",
                actual: other.kind(),
            }),
        }
    }

    /// Interpret as a count reply
    pub fn into_count(self) -> StoreResult<usize> {
        match self {
            Reply::Count(n) => Ok(n),
            other => Err(StoreError::UnexpectedReply {
                expected: "count",
                actual: other.kind(),
            }),
        }
    }

    /// Interpret as a member-set reply
    pub fn into_members(self) -> StoreResult<BTreeSet<String>> {
        match self {
            Reply::Members(m) => Ok(m),
            other => Err(StoreError::UnexpectedReply {
                expected: "members",
                actual: other.kind(),
            }),
        }
    }
}

/// An ordered, atomic group of commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    /// Creates an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command, returning its reply position
    pub fn push(&mut self, command: Command) -> usize {
        self.commands.push(command);
        self.commands.len() - 1
    }

    pub fn set_add(&mut self, key: impl Into<String>, member: impl Into<String>) -> usize {
        self.push(Command::SetAdd {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn set_remove(&mut self, key: impl Into<String>, member: impl Into<String>) -> usize {
        self.push(Command::SetRemove {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn set_remove_matching(&mut self, pattern: impl Into<String>, member: impl Into<String>) -> usize {
        self.push(Command::SetRemoveMatching {
            pattern: pattern.into(),
            member: member.into(),
        })
    }

    pub fn set_remove_listed(&mut self, list: impl Into<String>, member: impl Into<String>) -> usize {
        self.push(Command::SetRemoveListed {
            list: list.into(),
            member: member.into(),
        })
    }

    pub fn set_union_store(&mut self, dest: impl Into<String>, keys: Vec<String>) -> usize {
        self.push(Command::SetUnionStore {
            dest: dest.into(),
            keys,
        })
    }

    pub fn set_intersect(&mut self, keys: Vec<String>) -> usize {
        self.push(Command::SetIntersect { keys })
    }

    pub fn delete(&mut self, keys: Vec<String>) -> usize {
        self.push(Command::Delete { keys })
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Queued commands in execution order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_returns_reply_positions() {
        let mut batch = Batch::new();
        assert_eq!(batch.set_add("k", "a"), 0);
        assert_eq!(batch.set_remove("k", "b"), 1);
        assert_eq!(batch.delete(vec!["k".into()]), 2);
        assert_eq!(batch.set_remove_matching("k*", "a"), 3);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.commands()[3].name(), "SREM_MATCHING");
        assert_eq!(batch.commands()[1].name(), "SREM");
    }

    #[test]
    fn test_reply_shape_mismatch() {
        let err = Reply::Count(3).into_bool().unwrap_err();
        assert_eq!(
            err,
            StoreError::UnexpectedReply {
                expected: "bool",
                actual: "count"
            }
        );
        assert!(Reply::Bool(true).into_bool().unwrap());
    }
}
