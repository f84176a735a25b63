use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::models::{ActionType, Priority, RuleAction, SideEffect, TicketSnapshot, TicketStatus};

/// Handler for one action type
///
/// Handlers are pure: they read the action parameters and the snapshot, and
/// describe their effect as `SideEffect` values for the caller to apply.
pub trait ActionHandler: Send + Sync {
    fn execute(&self, action: &RuleAction, snapshot: &TicketSnapshot) -> Result<Vec<SideEffect>>;
}

/// Registry of action handlers, keyed by action type
///
/// This table is the versioned protocol boundary of the automation engine:
/// new action types register new handlers without touching existing rule
/// definitions, and unknown types surface as `UnsupportedAction`.
pub struct ActionHandlerRegistry {
    handlers: HashMap<ActionType, Box<dyn ActionHandler>>,
}

impl ActionHandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an action type
    pub fn register(&mut self, action_type: ActionType, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(action_type, handler);
    }

    /// Execute an action by its declared type name
    pub fn execute(
        &self,
        action: &RuleAction,
        snapshot: &TicketSnapshot,
    ) -> Result<Vec<SideEffect>> {
        let action_type = ActionType::from_str(&action.action_type)
            .map_err(|_| AppError::UnsupportedAction(action.action_type.clone()))?;

        let handler = self
            .handlers
            .get(&action_type)
            .ok_or_else(|| AppError::UnsupportedAction(action.action_type.clone()))?;

        handler.execute(action, snapshot)
    }
}

impl Default for ActionHandlerRegistry {
    fn default() -> Self {
        create_default_registry()
    }
}

/// Create a registry with all built-in handlers
pub fn create_default_registry() -> ActionHandlerRegistry {
    let mut registry = ActionHandlerRegistry::new();

    registry.register(ActionType::ChangeStatus, Box::new(ChangeStatusHandler));
    registry.register(ActionType::AssignAgent, Box::new(AssignAgentHandler));
    registry.register(ActionType::AddTag, Box::new(AddTagHandler));
    registry.register(
        ActionType::SendNotification,
        Box::new(SendNotificationHandler),
    );
    registry.register(ActionType::RecalculateSla, Box::new(RecalculateSlaHandler));
    registry.register(ActionType::CreateWorkOrder, Box::new(CreateWorkOrderHandler));

    registry
}

fn require_str_param<'a>(action: &'a RuleAction, key: &str) -> Result<&'a str> {
    action
        .parameters
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Validation(format!("'{}' parameter required", key)))
}

// ==================== Built-in handlers ====================

struct ChangeStatusHandler;

impl ActionHandler for ChangeStatusHandler {
    fn execute(&self, action: &RuleAction, _snapshot: &TicketSnapshot) -> Result<Vec<SideEffect>> {
        let status = require_str_param(action, "status")?;
        let to = TicketStatus::from_str(status)
            .map_err(|_| AppError::Validation(format!("Unknown ticket status: {}", status)))?;
        Ok(vec![SideEffect::StatusChanged { to }])
    }
}

struct AssignAgentHandler;

impl ActionHandler for AssignAgentHandler {
    fn execute(&self, action: &RuleAction, _snapshot: &TicketSnapshot) -> Result<Vec<SideEffect>> {
        let agent = require_str_param(action, "agent")?;
        Ok(vec![SideEffect::AgentAssigned {
            agent: agent.to_string(),
        }])
    }
}

struct AddTagHandler;

impl ActionHandler for AddTagHandler {
    fn execute(&self, action: &RuleAction, _snapshot: &TicketSnapshot) -> Result<Vec<SideEffect>> {
        let tag = require_str_param(action, "tag")?;
        Ok(vec![SideEffect::TagAdded {
            tag: tag.to_string(),
        }])
    }
}

struct SendNotificationHandler;

impl ActionHandler for SendNotificationHandler {
    fn execute(&self, action: &RuleAction, snapshot: &TicketSnapshot) -> Result<Vec<SideEffect>> {
        let channel = require_str_param(action, "channel")?;
        let message = action
            .parameters
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Ticket {} updated", snapshot.id));

        Ok(vec![SideEffect::NotificationQueued {
            channel: channel.to_string(),
            message,
        }])
    }
}

struct RecalculateSlaHandler;

impl ActionHandler for RecalculateSlaHandler {
    fn execute(&self, _action: &RuleAction, _snapshot: &TicketSnapshot) -> Result<Vec<SideEffect>> {
        Ok(vec![SideEffect::SlaRecalculationRequested])
    }
}

struct CreateWorkOrderHandler;

impl ActionHandler for CreateWorkOrderHandler {
    fn execute(&self, action: &RuleAction, snapshot: &TicketSnapshot) -> Result<Vec<SideEffect>> {
        let summary = action
            .parameters
            .get("summary")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Field visit for ticket {}", snapshot.id));

        let priority = match action.parameters.get("priority").and_then(|v| v.as_str()) {
            Some(p) => Priority::from_str(p)
                .map_err(|_| AppError::Validation(format!("Unknown priority: {}", p)))?,
            None => snapshot.priority,
        };

        Ok(vec![SideEffect::WorkOrderCreated { summary, priority }])
    }
}
