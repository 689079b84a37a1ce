use serde::Deserialize;

use crate::{
    domain::MessageEvent,
    rules::{CompiledRule, ForwardStrategy},
    utils::{normalize_name, strip_emphasis},
};

/// What to do when several rules match one message.
///
/// Observed deployments disagree on this, so it is configuration rather than
/// a hard-coded choice. Fan-out is the default: every matching rule fires
/// independently.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutePolicy {
    #[default]
    FanOut,
    FirstMatch,
}

/// One outgoing forward produced by a firing rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingDecision {
    /// Target conversation name (or id), resolved by the forwarder.
    pub target: String,
    pub text: String,
}

/// Evaluate a message against the compiled rules.
///
/// Origins compare case-insensitively. A message whose origin no rule listens
/// on returns early with no decisions and no text preprocessing. A firing
/// rule yields one decision; under `FanOut` every firing rule contributes,
/// under `FirstMatch` evaluation stops at the first.
pub fn route(
    ev: &MessageEvent,
    rules: &[CompiledRule],
    policy: RoutePolicy,
) -> Vec<RoutingDecision> {
    let origin = normalize_name(&ev.origin);

    let applicable: Vec<&CompiledRule> = rules.iter().filter(|r| r.origin == origin).collect();
    if applicable.is_empty() {
        return Vec::new();
    }

    let mut decisions = Vec::new();
    for rule in applicable {
        let match_text = if rule.strip_formatting {
            strip_emphasis(&ev.text)
        } else {
            ev.text.clone()
        };

        if !rule.matchers.iter().all(|m| m.is_match(&match_text)) {
            continue;
        }

        decisions.push(RoutingDecision {
            target: rule.target.clone(),
            text: forward_text(rule, ev, &match_text),
        });

        if policy == RoutePolicy::FirstMatch {
            break;
        }
    }

    decisions
}

fn forward_text(rule: &CompiledRule, ev: &MessageEvent, match_text: &str) -> String {
    match rule.strategy {
        ForwardStrategy::Full => ev.text.clone(),
        ForwardStrategy::Captured => captured_text(rule, match_text).unwrap_or_else(|| ev.text.clone()),
        ForwardStrategy::Annotated => annotate(ev),
    }
}

/// Space-joined capture groups of the first matcher, or `None` when the
/// match produced no groups.
fn captured_text(rule: &CompiledRule, match_text: &str) -> Option<String> {
    let caps = rule.matchers.first()?.captures(match_text)?;
    let groups: Vec<&str> = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .collect();
    if groups.is_empty() {
        return None;
    }
    Some(groups.join(" "))
}

fn annotate(ev: &MessageEvent) -> String {
    format!(
        "[{}] {} at {}:\n{}",
        ev.origin,
        ev.sender.0,
        ev.timestamp.format("%Y-%m-%d %H:%M UTC"),
        ev.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SenderId;
    use crate::rules::{compile, RuleConfig};
    use chrono::TimeZone;

    fn raw_rule(origin: &str, target: &str, pattern: &str) -> RuleConfig {
        RuleConfig {
            origin: origin.to_string(),
            target: target.to_string(),
            pattern: Some(pattern.to_string()),
            patterns: vec![],
            flags: None,
            wildcard: false,
            forward: ForwardStrategy::Full,
            strip_formatting: false,
        }
    }

    fn event(origin: &str, text: &str) -> MessageEvent {
        MessageEvent {
            origin: origin.to_string(),
            sender: SenderId("alice".to_string()),
            timestamp: chrono::Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap(),
            text: text.to_string(),
            message_id: Some("m1".to_string()),
        }
    }

    #[test]
    fn forwards_full_body_on_match() {
        let rules = compile(&[raw_rule("Sales", "Archive", "invoice")]);
        let decisions = route(&event("Sales", "New Invoice #42"), &rules, RoutePolicy::FanOut);

        assert_eq!(
            decisions,
            vec![RoutingDecision {
                target: "Archive".to_string(),
                text: "New Invoice #42".to_string(),
            }]
        );
    }

    #[test]
    fn origin_mismatch_yields_no_decisions() {
        let rules = compile(&[raw_rule("Sales", "Archive", "invoice")]);
        let decisions = route(
            &event("Support", "New Invoice #42"),
            &rules,
            RoutePolicy::FanOut,
        );
        assert!(decisions.is_empty());
    }

    #[test]
    fn origin_comparison_is_case_insensitive() {
        let rules = compile(&[raw_rule("Sales", "Archive", "invoice")]);
        let decisions = route(&event("SALES", "invoice time"), &rules, RoutePolicy::FanOut);
        assert_eq!(decisions.len(), 1);
    }

    #[test]
    fn all_matchers_must_match() {
        let mut r = raw_rule("Ops", "Oncall", "^ALERT");
        r.patterns = vec!["prod".to_string()];
        let rules = compile(&[r]);

        // Satisfies one of two matchers: no decision.
        let none = route(&event("Ops", "ALERT: staging down"), &rules, RoutePolicy::FanOut);
        assert!(none.is_empty());

        let one = route(&event("Ops", "ALERT: prod down"), &rules, RoutePolicy::FanOut);
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn captured_strategy_forwards_joined_groups() {
        let mut r = raw_rule("Sales", "Codes", r"^CODE:(\w+)$");
        r.forward = ForwardStrategy::Captured;
        let rules = compile(&[r]);

        let decisions = route(&event("Sales", "CODE:ABC123"), &rules, RoutePolicy::FanOut);
        assert_eq!(decisions[0].text, "ABC123");
    }

    #[test]
    fn captured_strategy_without_groups_falls_back_to_full_body() {
        let mut r = raw_rule("Sales", "Codes", "invoice");
        r.forward = ForwardStrategy::Captured;
        let rules = compile(&[r]);

        let decisions = route(&event("Sales", "invoice attached"), &rules, RoutePolicy::FanOut);
        assert_eq!(decisions[0].text, "invoice attached");
    }

    #[test]
    fn captured_strategy_uses_the_first_matcher() {
        let mut r = raw_rule("Sales", "Codes", r"CODE:(\w+)");
        r.patterns = vec!["ABC".to_string()];
        r.forward = ForwardStrategy::Captured;
        let rules = compile(&[r]);

        let decisions = route(&event("Sales", "CODE:ABC123"), &rules, RoutePolicy::FanOut);
        assert_eq!(decisions[0].text, "ABC123");
    }

    #[test]
    fn annotated_strategy_prefixes_origin_sender_timestamp() {
        let mut r = raw_rule("Sales", "Archive", "invoice");
        r.forward = ForwardStrategy::Annotated;
        let rules = compile(&[r]);

        let decisions = route(&event("Sales", "invoice #42"), &rules, RoutePolicy::FanOut);
        assert_eq!(
            decisions[0].text,
            "[Sales] alice at 2026-08-07 12:00 UTC:\ninvoice #42"
        );
    }

    #[test]
    fn fan_out_fires_every_matching_rule() {
        let rules = compile(&[
            raw_rule("Sales", "Archive", "invoice"),
            raw_rule("Sales", "Audit", "invoice"),
        ]);

        let decisions = route(&event("Sales", "invoice #42"), &rules, RoutePolicy::FanOut);
        let targets: Vec<&str> = decisions.iter().map(|d| d.target.as_str()).collect();
        assert_eq!(targets, vec!["Archive", "Audit"]);
    }

    #[test]
    fn first_match_stops_after_one_decision() {
        let rules = compile(&[
            raw_rule("Sales", "Archive", "invoice"),
            raw_rule("Sales", "Audit", "invoice"),
        ]);

        let decisions = route(&event("Sales", "invoice #42"), &rules, RoutePolicy::FirstMatch);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].target, "Archive");
    }

    #[test]
    fn strip_formatting_matches_through_emphasis_markers() {
        let mut r = raw_rule("Ops", "Oncall", "^URGENT");
        r.strip_formatting = true;
        let rules = compile(&[r]);

        let decisions = route(&event("Ops", "*URGENT* disk full"), &rules, RoutePolicy::FanOut);
        // Matching sees the stripped text; a full-body forward keeps the original.
        assert_eq!(decisions[0].text, "*URGENT* disk full");
    }

    #[test]
    fn without_strip_formatting_markers_block_anchored_patterns() {
        let rules = compile(&[raw_rule("Ops", "Oncall", "^URGENT")]);
        let decisions = route(&event("Ops", "*URGENT* disk full"), &rules, RoutePolicy::FanOut);
        assert!(decisions.is_empty());
    }
}
