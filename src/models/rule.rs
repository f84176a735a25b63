use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use super::ticket::{Priority, TicketStatus, TriggerEvent};

/// Automation rule evaluated against ticket snapshots
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AutomationRule {
    pub id: Uuid,

    /// Owning organization
    pub organization_id: Uuid,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub enabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Event that causes this rule to be considered
    pub trigger_event: TriggerEvent,

    /// Conditions evaluated against the ticket snapshot
    pub conditions: Vec<Condition>,

    /// How condition results combine
    #[serde(default)]
    pub conditions_logic: ConditionsLogic,

    /// Actions executed in declared order when the rule matches
    pub actions: Vec<RuleAction>,

    /// Execution order among rules matching the same event (lower runs first;
    /// ties break by declaration order)
    #[serde(default)]
    pub execution_order: u32,
}

impl AutomationRule {
    /// Create an enabled rule with no conditions or actions
    pub fn new(organization_id: Uuid, name: String, trigger_event: TriggerEvent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            name,
            enabled: true,
            created_at: now,
            updated_at: now,
            trigger_event,
            conditions: Vec::new(),
            conditions_logic: ConditionsLogic::All,
            actions: Vec::new(),
            execution_order: 0,
        }
    }
}

/// Combination logic for a rule's conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConditionsLogic {
    /// Logical AND, short-circuiting on the first false
    #[default]
    All,
    /// Logical OR, short-circuiting on the first true
    Any,
}

/// A single condition: (field path, operator, expected value)
///
/// The operator is kept as a string so unrecognized names surface as
/// evaluation-time errors instead of deserialization failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: String,
    pub value: JsonValue,
}

/// Recognized condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    In,
    NotIn,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    IsEmpty,
    IsNotEmpty,
    MatchesRegex,
}

/// An action declared on a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleAction {
    /// Action type name, resolved through the dispatch registry
    pub action_type: String,

    #[serde(default)]
    pub parameters: HashMap<String, JsonValue>,

    /// When true, a failure skips the remaining actions of this rule
    #[serde(default)]
    pub critical: bool,
}

/// Action types recognized by the built-in dispatch registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    ChangeStatus,
    AssignAgent,
    AddTag,
    SendNotification,
    RecalculateSla,
    CreateWorkOrder,
}

/// Effect an executed action asks the caller to apply
///
/// The engine never mutates the snapshot; these values are the only channel
/// through which actions take effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    StatusChanged { to: TicketStatus },
    AgentAssigned { agent: String },
    TagAdded { tag: String },
    NotificationQueued { channel: String, message: String },
    SlaRecalculationRequested,
    WorkOrderCreated { summary: String, priority: Priority },
}

/// Outcome of executing one action, for auditing by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionExecutionResult {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub action_type: String,
    pub success: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub side_effects: Vec<SideEffect>,
}

/// Outcome of evaluating one condition, for auditing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionOutcome {
    pub field: String,
    pub operator: String,
    pub matched: bool,
    /// Present when the condition failed closed (unknown operator, type
    /// mismatch, invalid pattern)
    pub error: Option<String>,
}

/// Per-rule record within an evaluation report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub matched: bool,
    pub condition_outcomes: Vec<ConditionOutcome>,
}

/// Full result of one automation pass over a trigger event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub trigger_event: TriggerEvent,
    pub ticket_id: Uuid,
    pub rule_evaluations: Vec<RuleEvaluation>,
    pub action_results: Vec<ActionExecutionResult>,
}
