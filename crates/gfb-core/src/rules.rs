use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::warn;

use crate::{errors::Error, routing::RoutePolicy, utils::normalize_name, Result};

/// Top-level rules document (the bot's `config.json`).
///
/// A missing or unparsable file is a fatal startup error; problems inside
/// individual rules are not (they are skipped at compile time).
#[derive(Clone, Debug, Deserialize)]
pub struct RulesFile {
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub routing: RoutePolicy,
}

/// One raw forwarding rule as written in the rules file.
#[derive(Clone, Debug, Deserialize)]
pub struct RuleConfig {
    /// Conversation name (or id) the rule listens on.
    pub origin: String,
    /// Conversation name (or id) to forward to.
    pub target: String,

    /// Single pattern; may be combined with `patterns`.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Additional patterns. All patterns on a rule must match (AND).
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Regex flags (`i`/`m`/`s`/`x`). Absent or empty means `i`.
    #[serde(default)]
    pub flags: Option<String>,
    /// Treat literal `*` in patterns as "match zero or more characters".
    #[serde(default)]
    pub wildcard: bool,

    #[serde(default)]
    pub forward: ForwardStrategy,
    /// Strip emphasis markers from the text before matching.
    #[serde(default)]
    pub strip_formatting: bool,
}

/// What text a firing rule forwards.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForwardStrategy {
    /// The original message text, unmodified.
    #[default]
    Full,
    /// The first matcher's capture groups, space-joined; falls back to the
    /// full body when the match has no groups.
    Captured,
    /// The full body prefixed with origin, sender and timestamp.
    Annotated,
}

/// An executable rule. Immutable after compilation.
#[derive(Clone, Debug)]
pub struct CompiledRule {
    /// Normalized origin name; compared against the normalized message origin.
    pub origin: String,
    pub target: String,
    /// Every matcher must match the message text for the rule to fire.
    pub matchers: Vec<Regex>,
    pub strategy: ForwardStrategy,
    pub strip_formatting: bool,
}

pub fn load_rules_file(path: &Path) -> Result<RulesFile> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "rules file not found: {}",
            path.display()
        )));
    }
    let txt = std::fs::read_to_string(path)?;
    parse_rules_file(&txt)
}

pub fn parse_rules_file(txt: &str) -> Result<RulesFile> {
    serde_json::from_str(txt).map_err(|e| Error::Config(format!("invalid rules file: {e}")))
}

/// Compile raw rules into executable matchers.
///
/// Patterns compile once at load time and are evaluated many times per
/// message. A rule that cannot compile degrades coverage but never stops the
/// service: it is logged and dropped, and the remaining rules stay live.
/// Output order matches input order.
pub fn compile(raw: &[RuleConfig]) -> Vec<CompiledRule> {
    let mut out = Vec::with_capacity(raw.len());

    for (idx, rule) in raw.iter().enumerate() {
        let patterns = declared_patterns(rule);
        if patterns.is_empty() {
            warn!(
                "rule #{idx} ({} -> {}) declares no patterns, skipping",
                rule.origin, rule.target
            );
            continue;
        }

        let mut matchers = Vec::with_capacity(patterns.len());
        let mut failed = false;
        for pat in &patterns {
            let source = if rule.wildcard {
                wildcard_to_regex(pat)
            } else {
                pat.clone()
            };
            match build_matcher(&source, rule.flags.as_deref()) {
                Ok(re) => matchers.push(re),
                Err(e) => {
                    warn!(
                        "rule #{idx} ({} -> {}): pattern {pat:?} does not compile ({e}), \
                         dropping rule",
                        rule.origin, rule.target
                    );
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            continue;
        }

        out.push(CompiledRule {
            origin: normalize_name(&rule.origin),
            target: rule.target.clone(),
            matchers,
            strategy: rule.forward,
            strip_formatting: rule.strip_formatting,
        });
    }

    out
}

fn declared_patterns(rule: &RuleConfig) -> Vec<String> {
    rule.pattern
        .iter()
        .chain(rule.patterns.iter())
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

/// Translate a wildcard pattern into a regex: everything is literal except
/// `*`, which matches zero or more characters.
fn wildcard_to_regex(pattern: &str) -> String {
    regex::escape(pattern).replace(r"\*", ".*")
}

fn build_matcher(source: &str, flags: Option<&str>) -> std::result::Result<Regex, regex::Error> {
    let flags = match flags {
        Some(f) if !f.trim().is_empty() => f.trim().to_string(),
        _ => "i".to_string(),
    };

    let mut builder = RegexBuilder::new(source);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            other => warn!("ignoring unsupported regex flag {other:?}"),
        }
    }
    builder.build()
}
