//! Exception behaviors: requests matching an expression get a fixed action.
//!
//! The backend stores each match expression and action as a JSON string.
//! Exceptions cannot be edited in place, so a changed exception is removed
//! by ID and added again.

use super::{changed, default_visibility};
use crate::backend::{Document, GraphqlResource};
use reconcile::{Error, Mutation, ReferenceKind, Resource, Result, diff};
use serde::{Deserialize, Serialize};

const CONDITION: &str = "condition";
const OPERATOR: &str = "operator";
const DEFAULT_CONDITION_OP: &str = "equals";
const DEFAULT_OPERATOR_OP: &str = "and";

/// A condition on one key, or an operator over nested expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchExpression {
    /// `equals`, `not-equals`, `in`, `not-in` or `exist` for a condition;
    /// `and`, `or` or `not` for an operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operand: Vec<MatchExpression>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "match")]
    pub condition: MatchExpression,
    /// `accept`, `drop`, `skip` or `suppressLog`.
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Exception {
    /// Identity of an exception, ignoring its backend ID.
    fn signature(&self) -> String {
        let condition = serde_json::to_string(&WireMatch::from(&self.condition)).unwrap_or_default();
        format!("{condition}|{}|{}", self.action, self.comment)
    }

    fn to_input(&self) -> Result<ExceptionInput> {
        let condition = serde_json::to_string(&WireMatch::from(&self.condition))
            .map_err(|e| Error::conversion("exception match", e.to_string()))?;
        let action = serde_json::to_string(&WireAction {
            key: "action".to_string(),
            value: self.action.clone(),
        })
        .map_err(|e| Error::conversion("exception action", e.to_string()))?;
        Ok(ExceptionInput {
            condition,
            actions: vec![action],
            comment: self.comment.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionBehavior {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default)]
    pub exceptions: Vec<Exception>,
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct WireMatch {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    op: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    items: Vec<WireMatch>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    value: Vec<String>,
}

impl From<&MatchExpression> for WireMatch {
    fn from(expression: &MatchExpression) -> Self {
        if expression.operand.is_empty() {
            Self {
                kind: CONDITION.to_string(),
                op: expression.operator.clone().unwrap_or_else(|| DEFAULT_CONDITION_OP.to_string()),
                items: Vec::new(),
                key: expression.key.clone(),
                value: expression.value.clone(),
            }
        } else {
            Self {
                kind: OPERATOR.to_string(),
                op: expression.operator.clone().unwrap_or_else(|| DEFAULT_OPERATOR_OP.to_string()),
                items: expression.operand.iter().map(Self::from).collect(),
                key: String::new(),
                value: Vec::new(),
            }
        }
    }
}

impl From<WireMatch> for MatchExpression {
    fn from(wire: WireMatch) -> Self {
        Self {
            operator: (!wire.op.is_empty()).then_some(wire.op),
            operand: wire.items.into_iter().map(Self::from).collect(),
            key: wire.key,
            value: wire.value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct WireAction {
    key: String,
    value: String,
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExceptionInput {
    /// JSON-encoded match expression.
    #[serde(rename = "match")]
    pub condition: String,
    /// JSON-encoded `{"key": "action", "value": ...}` entries.
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExceptionBehaviorCreateInput {
    pub name: String,
    pub visibility: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<ExceptionInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionBehaviorUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_exceptions: Vec<ExceptionInput>,
    /// Exception IDs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_exceptions: Vec<String>,
}

impl Mutation for ExceptionBehaviorUpdateInput {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.add_exceptions.is_empty() && self.remove_exceptions.is_empty()
    }
}

// ============================================================================
// Backend Objects
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteAction {
    #[serde(default)]
    pub id: String,
    pub action: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteException {
    pub id: String,
    #[serde(rename = "match")]
    pub condition: String,
    #[serde(default)]
    pub actions: Option<Vec<RemoteAction>>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteExceptionBehavior {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub visibility: Option<String>,
    pub exceptions: Option<Vec<RemoteException>>,
}

fn render_exception(remote: RemoteException) -> Result<Exception> {
    let wire: WireMatch = serde_json::from_str(&remote.condition)
        .map_err(|e| Error::conversion(format!("match of exception {}", remote.id), e.to_string()))?;
    let action = match remote.actions.unwrap_or_default().into_iter().next() {
        Some(action) => {
            let wire: WireAction = serde_json::from_str(&action.action).map_err(|e| {
                Error::conversion(format!("action of exception {}", remote.id), e.to_string())
            })?;
            wire.value
        }
        None => String::new(),
    };
    Ok(Exception {
        id: remote.id,
        condition: wire.into(),
        action,
        comment: remote.comment.unwrap_or_default(),
    })
}

pub struct ExceptionsBehavior;

impl Resource for ExceptionsBehavior {
    type Desired = ExceptionBehavior;
    type Observed = ExceptionBehavior;
    type Remote = RemoteExceptionBehavior;
    type CreateInput = ExceptionBehaviorCreateInput;
    type UpdateInput = ExceptionBehaviorUpdateInput;

    const KIND: &'static str = "exceptions";
    const REFERENCE: Option<ReferenceKind> = Some(ReferenceKind::Behavior);

    fn create_input(desired: &ExceptionBehavior) -> Result<ExceptionBehaviorCreateInput> {
        Ok(ExceptionBehaviorCreateInput {
            name: desired.name.clone(),
            visibility: desired.visibility.clone(),
            exceptions: desired
                .exceptions
                .iter()
                .map(Exception::to_input)
                .collect::<Result<_>>()?,
        })
    }

    fn update_input(
        observed: &ExceptionBehavior,
        desired: &ExceptionBehavior,
    ) -> Result<ExceptionBehaviorUpdateInput> {
        let exceptions = diff(&observed.exceptions, &desired.exceptions, Exception::signature);
        Ok(ExceptionBehaviorUpdateInput {
            name: changed(&observed.name, &desired.name),
            add_exceptions: exceptions
                .added
                .iter()
                .map(Exception::to_input)
                .collect::<Result<_>>()?,
            remove_exceptions: exceptions.removed.into_iter().map(|e| e.id).collect(),
        })
    }

    fn render(remote: RemoteExceptionBehavior) -> Result<ExceptionBehavior> {
        Ok(ExceptionBehavior {
            id: remote.id,
            name: remote.name,
            visibility: remote.visibility.unwrap_or_else(default_visibility),
            exceptions: remote
                .exceptions
                .unwrap_or_default()
                .into_iter()
                .map(render_exception)
                .collect::<Result<_>>()?,
        })
    }

    fn remote_id(remote: &RemoteExceptionBehavior) -> &str {
        &remote.id
    }

    fn observed_id(observed: &ExceptionBehavior) -> &str {
        &observed.id
    }
}

macro_rules! exception_fields {
    () => {
        "id name visibility exceptions { id match actions { id action } comment }"
    };
}

impl GraphqlResource for ExceptionsBehavior {
    const CREATE: Document = Document {
        operation: "newExceptionBehavior",
        query: concat!(
            "mutation newExceptionBehavior($behaviorInput: ExceptionBehaviorInput) ",
            "{ newExceptionBehavior(behaviorInput: $behaviorInput) { ",
            exception_fields!(),
            " } }"
        ),
    };
    const FETCH: Document = Document {
        operation: "getExceptionBehavior",
        query: concat!(
            "query getExceptionBehavior($id: ID!) { getExceptionBehavior(id: $id) { ",
            exception_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateExceptionBehavior",
        query: "mutation updateExceptionBehavior($behaviorInput: ExceptionBehaviorUpdateInput, $id: ID!) { updateExceptionBehavior(behaviorInput: $behaviorInput, id: $id) }",
    };
    const DELETE: Document = Document {
        operation: "deleteBehavior",
        query: "mutation deleteBehavior($id: ID!) { deleteBehavior(id: $id) }",
    };
    const INPUT: &'static str = "behaviorInput";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observed() -> ExceptionBehavior {
        ExceptionsBehavior::render(
            serde_json::from_value(json!({
                "id": "eb-1",
                "name": "allow-scanners",
                "visibility": "Shared",
                "exceptions": [
                    {
                        "id": "e-1",
                        "match": r#"{"type":"condition","op":"equals","key":"sourceIP","value":["10.0.0.1"]}"#,
                        "actions": [{"id": "a-1", "action": r#"{"key":"action","value":"accept"}"#}],
                        "comment": "scanner"
                    },
                    {
                        "id": "e-2",
                        "match": r#"{"type":"operator","op":"and","items":[{"type":"condition","op":"equals","key":"hostName","value":["shop.example.com"]},{"type":"condition","op":"in","key":"url","value":["/health","/ready"]}]}"#,
                        "actions": [{"id": "a-2", "action": r#"{"key":"action","value":"skip"}"#}]
                    }
                ]
            }))
            .unwrap(),
        )
        .unwrap()
    }

    fn declared() -> ExceptionBehavior {
        serde_json::from_value(json!({
            "name": "allow-scanners",
            "exceptions": [
                {
                    "match": {"key": "sourceIP", "value": ["10.0.0.1"]},
                    "action": "accept",
                    "comment": "scanner"
                },
                {
                    "match": {"operand": [
                        {"key": "hostName", "value": ["shop.example.com"]},
                        {"operator": "in", "key": "url", "value": ["/health", "/ready"]}
                    ]},
                    "action": "skip"
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_render_parses_match_tree() {
        let behavior = observed();
        let nested = &behavior.exceptions[1];
        assert_eq!(nested.action, "skip");
        assert_eq!(nested.condition.operator.as_deref(), Some("and"));
        assert_eq!(nested.condition.operand[1].value, vec!["/health", "/ready"]);
    }

    #[test]
    fn test_default_operators_match_observed() {
        let input = ExceptionsBehavior::update_input(&observed(), &declared()).unwrap();
        assert!(input.is_empty(), "unexpected payload: {input:?}");
    }

    #[test]
    fn test_changed_exception_is_replaced() {
        let mut desired = declared();
        desired.exceptions[0].action = "drop".to_string();

        let input = ExceptionsBehavior::update_input(&observed(), &desired).unwrap();

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "addExceptions": [{
                    "match": r#"{"type":"condition","op":"equals","key":"sourceIP","value":["10.0.0.1"]}"#,
                    "actions": [r#"{"key":"action","value":"drop"}"#],
                    "comment": "scanner"
                }],
                "removeExceptions": ["e-1"]
            })
        );
    }

    #[test]
    fn test_create_input_encodes_operator() {
        let mut desired = declared();
        desired.exceptions.remove(0);

        let input = ExceptionsBehavior::create_input(&desired).unwrap();

        assert_eq!(input.exceptions.len(), 1);
        let condition: serde_json::Value = serde_json::from_str(&input.exceptions[0].condition).unwrap();
        assert_eq!(condition["type"], "operator");
        assert_eq!(condition["op"], "and");
        assert_eq!(condition["items"][1]["op"], "in");
        assert_eq!(input.exceptions[0].actions, vec![r#"{"key":"action","value":"skip"}"#]);
    }

    #[test]
    fn test_malformed_match_is_a_conversion_error() {
        let remote: RemoteExceptionBehavior = serde_json::from_value(json!({
            "id": "eb-1",
            "name": "broken",
            "exceptions": [{"id": "e-1", "match": "not json", "actions": []}]
        }))
        .unwrap();

        let err = ExceptionsBehavior::render(remote).unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }), "got {err:?}");
    }
}
