use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Ticket priority level
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Normal,
    Low,
}

impl Priority {
    /// Numeric rank for ordering: lower is more urgent
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

/// Ticket workflow status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Pending,
    WaitingOnCustomer,
    Resolved,
    Closed,
}

/// Domain occurrence that causes automation rules to be evaluated
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerEvent {
    TicketCreated,
    TicketUpdated,
    FieldChanged,
    StatusChanged,
    PriorityChanged,
    TicketResolved,
}

/// Read-only projection of a ticket passed into the engines
///
/// The engines never hold a reference back to the live ticket; they consume a
/// snapshot and return decisions. Mutable ticket state stays owned by the
/// caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSnapshot {
    /// Unique identifier
    pub id: Uuid,

    /// Owning organization
    pub organization_id: Uuid,

    /// Current priority
    pub priority: Priority,

    /// Current status
    pub status: TicketStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When the first agent response was sent, if any
    pub first_response_at: Option<DateTime<Utc>>,

    /// When the ticket was resolved, if it was
    pub resolved_at: Option<DateTime<Utc>>,

    /// Arbitrary field values consulted by rule conditions
    #[serde(default)]
    pub field_values: HashMap<String, JsonValue>,
}

impl TicketSnapshot {
    /// Create a snapshot with the minimal required fields
    pub fn new(organization_id: Uuid, priority: Priority, status: TicketStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            priority,
            status,
            created_at: Utc::now(),
            first_response_at: None,
            resolved_at: None,
            field_values: HashMap::new(),
        }
    }

    /// Resolve a condition field path against this snapshot
    ///
    /// Built-in fields resolve by name; custom values resolve through the
    /// `fields.` prefix. Unknown paths resolve to null.
    pub fn field_value(&self, path: &str) -> JsonValue {
        match path {
            "id" => JsonValue::String(self.id.to_string()),
            "organization_id" => JsonValue::String(self.organization_id.to_string()),
            "priority" => JsonValue::String(self.priority.to_string()),
            "status" => JsonValue::String(self.status.to_string()),
            "created_at" => JsonValue::String(
                self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            "first_response_at" => self
                .first_response_at
                .map(|t| JsonValue::String(t.to_rfc3339_opts(SecondsFormat::Secs, true)))
                .unwrap_or(JsonValue::Null),
            "resolved_at" => self
                .resolved_at
                .map(|t| JsonValue::String(t.to_rfc3339_opts(SecondsFormat::Secs, true)))
                .unwrap_or(JsonValue::Null),
            _ => {
                if let Some(stripped) = path.strip_prefix("fields.") {
                    if let Some(value) = self.field_values.get(stripped) {
                        return value.clone();
                    }
                }
                JsonValue::Null
            }
        }
    }
}

/// Interval during which SLA accounting is suspended
///
/// Supplied by the caller (e.g. while a ticket waits on the customer). An open
/// interval is clamped to the evaluation instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PauseInterval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}
