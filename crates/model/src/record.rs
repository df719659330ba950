use crate::event::MutationData;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Lifecycle transition which produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastOperation {
    Create,
    Update,
    Delete,
}

impl LastOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LastOperation::Create => "create",
            LastOperation::Update => "update",
            LastOperation::Delete => "delete",
        }
    }
}

impl Display for LastOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row written to the key-value store, keyed by `(pk, sk)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub pk: String,
    pub sk: String,
    pub ts: String,
    #[serde(rename = "lastOperation")]
    pub last_operation: LastOperation,
}

impl MutationRecord {
    pub fn new(data: MutationData, last_operation: LastOperation) -> Self {
        MutationRecord {
            pk: data.pk,
            sk: data.sk,
            ts: data.ts,
            last_operation,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            pk: self.pk.clone(),
            sk: self.sk.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub pk: String,
    pub sk: String,
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.pk, self.sk)
    }
}
