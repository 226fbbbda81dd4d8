//! Queued mutation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::EntityId;

/// Process-unique operation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Lifecycle of an operation:
///
/// ```text
/// pending -> processing -> completed
///              |
///              v
///            failed -> pending   (while retry budget remains)
///            failed              (exhausted, terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Processing,
    Failed,
    Completed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Processing => write!(f, "processing"),
            OperationStatus::Failed => write!(f, "failed"),
            OperationStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A durable record of one intended mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub entity_type: String,
    pub entity_id: EntityId,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Logical clock used for FIFO ordering; wall-clock time can go backwards.
    pub sequence: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: OperationStatus,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Operation {
    pub fn new(
        kind: OperationKind,
        entity_type: impl Into<String>,
        entity_id: EntityId,
        payload: serde_json::Value,
        sequence: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            entity_type: entity_type.into(),
            entity_id,
            payload,
            created_at: Utc::now(),
            sequence,
            retry_count: 0,
            max_retries,
            status: OperationStatus::Pending,
            priority: 0,
            last_error: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Failed with no retry budget left.
    pub fn is_exhausted(&self) -> bool {
        self.status == OperationStatus::Failed && self.retry_count >= self.max_retries
    }

    /// Decode the payload into a handler-specific type.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}] retries {}/{}",
            self.kind, self.entity_type, self.entity_id, self.status, self.retry_count, self.max_retries
        )?;
        if let Some(err) = &self.last_error {
            write!(f, " ({})", err)?;
        }
        Ok(())
    }
}
