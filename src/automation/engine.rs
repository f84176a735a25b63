use crate::automation::actions::ActionHandlerRegistry;
use crate::automation::operators::{self, RegexCache};
use crate::config::AutomationConfig;
use crate::error::Result;
use crate::models::{
    ActionExecutionResult, AutomationRule, Condition, ConditionOutcome, ConditionsLogic,
    EvaluationReport, RuleEvaluation, TicketSnapshot, TriggerEvent,
};

/// Automation rule engine
///
/// Evaluates trigger conditions against a ticket snapshot and executes matched
/// actions through the handler registry. The engine never mutates the snapshot;
/// all effects are expressed in the returned results for the caller to apply.
/// Evaluation is deterministic: the same rule set and snapshot always produce
/// the same ordered results.
pub struct AutomationEngine {
    config: AutomationConfig,
    registry: ActionHandlerRegistry,
}

impl AutomationEngine {
    /// Create an engine with the built-in action handlers
    pub fn new(config: AutomationConfig) -> Self {
        Self {
            config,
            registry: ActionHandlerRegistry::default(),
        }
    }

    /// Create an engine with a caller-extended handler registry
    pub fn with_registry(config: AutomationConfig, registry: ActionHandlerRegistry) -> Self {
        Self { config, registry }
    }

    /// Evaluate rules for a trigger event and return the flat action results
    pub fn evaluate_automation(
        &self,
        trigger_event: TriggerEvent,
        snapshot: &TicketSnapshot,
        applicable_rules: &[AutomationRule],
    ) -> Result<Vec<ActionExecutionResult>> {
        self.evaluate(trigger_event, snapshot, applicable_rules)
            .map(|report| report.action_results)
    }

    /// Evaluate rules for a trigger event with full per-rule audit detail
    pub fn evaluate(
        &self,
        trigger_event: TriggerEvent,
        snapshot: &TicketSnapshot,
        applicable_rules: &[AutomationRule],
    ) -> Result<EvaluationReport> {
        let mut selected: Vec<&AutomationRule> = applicable_rules
            .iter()
            .filter(|rule| {
                rule.enabled
                    && rule.trigger_event == trigger_event
                    && rule.organization_id == snapshot.organization_id
            })
            .collect();

        // Stable sort: equal execution_order keeps declaration order
        selected.sort_by_key(|rule| rule.execution_order);

        if selected.len() > self.config.max_rules_per_event {
            tracing::warn!(
                ticket_id = %snapshot.id,
                selected = selected.len(),
                cap = self.config.max_rules_per_event,
                "Rule set exceeds per-event cap, truncating"
            );
            selected.truncate(self.config.max_rules_per_event);
        }

        let mut report = EvaluationReport {
            trigger_event,
            ticket_id: snapshot.id,
            rule_evaluations: Vec::with_capacity(selected.len()),
            action_results: Vec::new(),
        };

        // One regex cache per evaluation pass
        let mut cache = RegexCache::new();

        for rule in selected {
            let (matched, condition_outcomes) =
                self.evaluate_conditions(rule, snapshot, &mut cache);

            report.rule_evaluations.push(RuleEvaluation {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                matched,
                condition_outcomes,
            });

            if !matched {
                continue;
            }

            tracing::info!(
                ticket_id = %snapshot.id,
                rule_id = %rule.id,
                rule_name = %rule.name,
                actions = rule.actions.len(),
                "Automation rule matched"
            );

            self.execute_actions(rule, snapshot, &mut report.action_results);
        }

        Ok(report)
    }

    /// Evaluate a rule's conditions with short-circuit all/any logic
    ///
    /// A condition that errors (unknown operator, type mismatch, bad pattern)
    /// evaluates as non-matching so a malformed rule cannot spuriously fire;
    /// the error is kept in the outcome for auditing.
    fn evaluate_conditions(
        &self,
        rule: &AutomationRule,
        snapshot: &TicketSnapshot,
        cache: &mut RegexCache,
    ) -> (bool, Vec<ConditionOutcome>) {
        if rule.conditions.is_empty() {
            return (true, Vec::new());
        }

        let mut outcomes = Vec::with_capacity(rule.conditions.len());
        let mut matched = rule.conditions_logic == ConditionsLogic::All;

        for condition in &rule.conditions {
            let outcome = self.evaluate_condition(condition, snapshot, cache);
            let condition_matched = outcome.matched;
            outcomes.push(outcome);

            match rule.conditions_logic {
                ConditionsLogic::All => {
                    if !condition_matched {
                        matched = false;
                        break;
                    }
                }
                ConditionsLogic::Any => {
                    if condition_matched {
                        matched = true;
                        break;
                    }
                }
            }
        }

        (matched, outcomes)
    }

    fn evaluate_condition(
        &self,
        condition: &Condition,
        snapshot: &TicketSnapshot,
        cache: &mut RegexCache,
    ) -> ConditionOutcome {
        if condition.field.len() > self.config.max_field_path_len {
            return ConditionOutcome {
                field: condition.field.clone(),
                operator: condition.operator.clone(),
                matched: false,
                error: Some(format!(
                    "Field path exceeds {} characters",
                    self.config.max_field_path_len
                )),
            };
        }

        let actual = snapshot.field_value(&condition.field);

        match operators::evaluate(&condition.operator, &actual, &condition.value, cache) {
            Ok(matched) => ConditionOutcome {
                field: condition.field.clone(),
                operator: condition.operator.clone(),
                matched,
                error: None,
            },
            Err(e) => {
                tracing::debug!(
                    field = %condition.field,
                    operator = %condition.operator,
                    error = %e,
                    "Condition failed closed"
                );
                ConditionOutcome {
                    field: condition.field.clone(),
                    operator: condition.operator.clone(),
                    matched: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Execute a matched rule's actions in declared order
    ///
    /// Fail-soft at the action level: a failure is recorded and later actions
    /// still run, unless the failed action is marked critical, which skips the
    /// rest of this rule only.
    fn execute_actions(
        &self,
        rule: &AutomationRule,
        snapshot: &TicketSnapshot,
        results: &mut Vec<ActionExecutionResult>,
    ) {
        for action in &rule.actions {
            match self.registry.execute(action, snapshot) {
                Ok(side_effects) => {
                    results.push(ActionExecutionResult {
                        rule_id: rule.id,
                        rule_name: rule.name.clone(),
                        action_type: action.action_type.clone(),
                        success: true,
                        error: None,
                        side_effects,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        ticket_id = %snapshot.id,
                        rule_id = %rule.id,
                        action_type = %action.action_type,
                        critical = action.critical,
                        error = %e,
                        "Action execution failed"
                    );
                    results.push(ActionExecutionResult {
                        rule_id: rule.id,
                        rule_name: rule.name.clone(),
                        action_type: action.action_type.clone(),
                        success: false,
                        error: Some(e.to_string()),
                        side_effects: Vec::new(),
                    });

                    if action.critical {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, RuleAction, SideEffect, TicketStatus};
    use serde_json::json;
    use uuid::Uuid;

    fn create_test_snapshot() -> TicketSnapshot {
        TicketSnapshot::new(Uuid::new_v4(), Priority::High, TicketStatus::Open)
    }

    fn condition(field: &str, operator: &str, value: serde_json::Value) -> Condition {
        Condition {
            field: field.to_string(),
            operator: operator.to_string(),
            value,
        }
    }

    fn no_params() -> std::collections::HashMap<String, serde_json::Value> {
        std::collections::HashMap::new()
    }

    fn tag_action(tag: &str) -> RuleAction {
        RuleAction {
            action_type: "add_tag".to_string(),
            parameters: [("tag".to_string(), json!(tag))].into_iter().collect(),
            critical: false,
        }
    }

    fn create_test_rule(snapshot: &TicketSnapshot, name: &str) -> AutomationRule {
        let mut rule = AutomationRule::new(
            snapshot.organization_id,
            name.to_string(),
            TriggerEvent::TicketCreated,
        );
        rule.actions.push(tag_action("auto"));
        rule
    }

    fn engine() -> AutomationEngine {
        AutomationEngine::new(AutomationConfig::default())
    }

    #[test]
    fn test_all_logic_short_circuits_to_no_match() {
        let snapshot = create_test_snapshot();
        let mut rule = create_test_rule(&snapshot, "High open tickets");
        rule.conditions = vec![
            condition("priority", "equals", json!("high")),
            condition("status", "equals", json!("closed")),
        ];

        let report = engine()
            .evaluate(TriggerEvent::TicketCreated, &snapshot, &[rule])
            .unwrap();

        assert!(!report.rule_evaluations[0].matched);
        assert!(report.action_results.is_empty());
    }

    #[test]
    fn test_any_logic_matches_on_first_true() {
        let snapshot = create_test_snapshot();
        let mut rule = create_test_rule(&snapshot, "High or urgent");
        rule.conditions_logic = ConditionsLogic::Any;
        rule.conditions = vec![
            condition("priority", "equals", json!("high")),
            condition("priority", "equals", json!("urgent")),
        ];

        let report = engine()
            .evaluate(TriggerEvent::TicketCreated, &snapshot, &[rule])
            .unwrap();

        assert!(report.rule_evaluations[0].matched);
        // Short-circuited after the first condition
        assert_eq!(report.rule_evaluations[0].condition_outcomes.len(), 1);
        assert_eq!(report.action_results.len(), 1);
    }

    #[test]
    fn test_unknown_operator_fails_closed_and_is_audited() {
        let snapshot = create_test_snapshot();
        let mut rule = create_test_rule(&snapshot, "Malformed rule");
        rule.conditions = vec![condition("priority", "sounds_like", json!("high"))];

        let report = engine()
            .evaluate(TriggerEvent::TicketCreated, &snapshot, &[rule])
            .unwrap();

        let evaluation = &report.rule_evaluations[0];
        assert!(!evaluation.matched);
        assert!(evaluation.condition_outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("sounds_like"));
        assert!(report.action_results.is_empty());
    }

    #[test]
    fn test_trigger_and_organization_filtering() {
        let snapshot = create_test_snapshot();

        let matching = create_test_rule(&snapshot, "Right event");
        let mut wrong_event = create_test_rule(&snapshot, "Wrong event");
        wrong_event.trigger_event = TriggerEvent::StatusChanged;
        let mut wrong_org = create_test_rule(&snapshot, "Wrong org");
        wrong_org.organization_id = Uuid::new_v4();
        let mut disabled = create_test_rule(&snapshot, "Disabled");
        disabled.enabled = false;

        let rules = [matching, wrong_event, wrong_org, disabled];
        let report = engine()
            .evaluate(TriggerEvent::TicketCreated, &snapshot, &rules)
            .unwrap();

        assert_eq!(report.rule_evaluations.len(), 1);
        assert_eq!(report.rule_evaluations[0].rule_name, "Right event");
    }

    #[test]
    fn test_execution_order_with_declaration_tiebreak() {
        let snapshot = create_test_snapshot();

        let mut second = create_test_rule(&snapshot, "second");
        second.execution_order = 10;
        second.actions = vec![tag_action("b")];
        let mut first = create_test_rule(&snapshot, "first");
        first.execution_order = 5;
        first.actions = vec![tag_action("a")];
        let mut tied = create_test_rule(&snapshot, "tied-with-second");
        tied.execution_order = 10;
        tied.actions = vec![tag_action("c")];

        let results = engine()
            .evaluate_automation(
                TriggerEvent::TicketCreated,
                &snapshot,
                &[second, first, tied],
            )
            .unwrap();

        let order: Vec<_> = results.iter().map(|r| r.rule_name.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "tied-with-second"]);
    }

    #[test]
    fn test_fail_soft_action_continues() {
        let snapshot = create_test_snapshot();
        let mut rule = create_test_rule(&snapshot, "Partly broken");
        rule.actions = vec![
            RuleAction {
                action_type: "assign_agent".to_string(),
                parameters: no_params(), // missing 'agent'
                critical: false,
            },
            tag_action("still-runs"),
        ];

        let results = engine()
            .evaluate_automation(TriggerEvent::TicketCreated, &snapshot, &[rule])
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(
            results[1].side_effects,
            vec![SideEffect::TagAdded {
                tag: "still-runs".to_string()
            }]
        );
    }

    #[test]
    fn test_critical_action_failure_skips_rest_of_rule() {
        let snapshot = create_test_snapshot();
        let mut broken = create_test_rule(&snapshot, "Critical failure");
        broken.actions = vec![
            RuleAction {
                action_type: "unknown_action".to_string(),
                parameters: no_params(),
                critical: true,
            },
            tag_action("never-runs"),
        ];
        let mut later = create_test_rule(&snapshot, "Later rule");
        later.execution_order = 1;
        later.actions = vec![tag_action("runs-anyway")];

        let results = engine()
            .evaluate_automation(TriggerEvent::TicketCreated, &snapshot, &[broken, later])
            .unwrap();

        // Failed critical action recorded, its successor skipped, next rule ran
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert_eq!(results[1].rule_name, "Later rule");
        assert!(results[1].success);
    }

    #[test]
    fn test_idempotent_evaluation() {
        let snapshot = create_test_snapshot();
        let mut rule = create_test_rule(&snapshot, "Deterministic");
        rule.conditions = vec![condition("priority", "in", json!(["high", "urgent"]))];
        rule.actions = vec![tag_action("x"), tag_action("y")];
        let rules = [rule];

        let engine = engine();
        let first = engine
            .evaluate_automation(TriggerEvent::TicketCreated, &snapshot, &rules)
            .unwrap();
        let second = engine
            .evaluate_automation(TriggerEvent::TicketCreated, &snapshot, &rules)
            .unwrap();

        let flatten = |results: &[ActionExecutionResult]| {
            results
                .iter()
                .map(|r| (r.rule_name.clone(), r.action_type.clone(), r.success))
                .collect::<Vec<_>>()
        };
        assert_eq!(flatten(&first), flatten(&second));
    }

    #[test]
    fn test_rule_without_conditions_always_matches() {
        let snapshot = create_test_snapshot();
        let rule = create_test_rule(&snapshot, "Unconditional");

        let results = engine()
            .evaluate_automation(TriggerEvent::TicketCreated, &snapshot, &[rule])
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
    }
}
