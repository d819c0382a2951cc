//! Branch and tag rulesets declared in repository configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A ruleset as declared in `repository.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetSpec {
    pub name: String,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_enforcement")]
    pub enforcement: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bypass_actors: Vec<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<RulesetConditions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSpec>,
}

fn default_target() -> String {
    "branch".to_string()
}

fn default_enforcement() -> String {
    "active".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesetConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<RefNameCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefNameCondition {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// One rule of a ruleset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_yaml::Value>,
}

impl RulesetSpec {
    /// The request body for creating or replacing this ruleset.
    ///
    /// Parameters of `pull_request` and `required_status_checks` rules are
    /// completed with platform defaults so comparisons see the full shape.
    pub fn to_body(&self) -> serde_json::Result<Value> {
        let mut body = Map::new();
        body.insert("name".into(), Value::String(self.name.clone()));
        body.insert("target".into(), Value::String(self.target.clone()));
        body.insert("enforcement".into(), Value::String(self.enforcement.clone()));

        let actors = self
            .bypass_actors
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        body.insert("bypass_actors".into(), Value::Array(actors));

        let mut conditions = Map::new();
        if let Some(ref_name) = self.conditions.as_ref().and_then(|c| c.ref_name.as_ref()) {
            conditions.insert(
                "ref_name".into(),
                json!({ "include": ref_name.include, "exclude": ref_name.exclude }),
            );
        }
        body.insert("conditions".into(), Value::Object(conditions));

        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let mut entry = Map::new();
            entry.insert("type".into(), Value::String(rule.rule_type.clone()));
            if let Some(parameters) = &rule.parameters {
                let given = serde_json::to_value(parameters)?;
                entry.insert("parameters".into(), rule_parameters(&rule.rule_type, given));
            }
            rules.push(Value::Object(entry));
        }
        body.insert("rules".into(), Value::Array(rules));

        Ok(Value::Object(body))
    }
}

fn rule_parameters(rule_type: &str, given: Value) -> Value {
    let defaults = match rule_type {
        "pull_request" => json!({
            "dismiss_stale_reviews_on_push": true,
            "require_code_owner_review": true,
            "require_last_push_approval": true,
            "required_approving_review_count": 1,
            "required_review_thread_resolution": true,
        }),
        "required_status_checks" => json!({
            "strict_required_status_checks_policy": true,
            "required_status_checks": [],
        }),
        _ => return given,
    };

    let mut params = match defaults {
        Value::Object(map) => map,
        other => return other,
    };
    if let Value::Object(given) = given {
        for (key, value) in given {
            if params.contains_key(&key) && !value.is_null() {
                params.insert(key, value);
            }
        }
    }
    Value::Object(params)
}

/// Whether every value in `desired` is present and equal in `current`.
///
/// Objects compare key by key, ignoring keys only `current` has. Arrays must
/// have the same length and each desired element must match a distinct
/// current element, in any order.
pub fn json_subset(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(key, value)| have.get(key).is_some_and(|h| json_subset(value, h))),
        (Value::Array(want), Value::Array(have)) => {
            if want.len() != have.len() {
                return false;
            }
            let mut used = vec![false; have.len()];
            want.iter().all(|w| {
                let found = have
                    .iter()
                    .enumerate()
                    .find(|(i, h)| !used[*i] && json_subset(w, h))
                    .map(|(i, _)| i);
                match found {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (want, have) => want == have,
    }
}
