//! Rate-limit practices.
//!
//! Rules are keyed by URI; a rule whose scope, limit, comment or action
//! changed is updated in place under its recorded ID.

use super::{changed, default_visibility};
use crate::backend::{Document, GraphqlResource};
use reconcile::{Mutation, ReferenceKind, Resource, Result, keyed_diff};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub uri: String,
    pub scope: String,
    pub limit: i64,
    #[serde(default)]
    pub comment: String,
    pub action: String,
}

impl RateLimitRule {
    fn differs(&self, other: &Self) -> bool {
        self.scope != other.scope
            || self.limit != other.limit
            || self.comment != other.comment
            || self.action != other.action
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default)]
    pub rules: Vec<RateLimitRule>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub practice_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// Built-in practice.
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInput {
    /// Set only when updating a rule in place.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "URI")]
    pub uri: String,
    pub scope: String,
    pub limit: i64,
    pub comment: String,
    pub action: String,
}

impl From<RateLimitRule> for RuleInput {
    fn from(rule: RateLimitRule) -> Self {
        Self {
            id: rule.id,
            uri: rule.uri,
            scope: rule.scope,
            limit: rule.limit,
            comment: rule.comment,
            action: rule.action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitCreateInput {
    pub name: String,
    pub visibility: String,
    pub rules: Vec<RuleInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_rules: Vec<RuleInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_rules: Vec<String>,
    /// Full rule records, carrying their IDs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_rules: Vec<RuleInput>,
}

impl Mutation for RateLimitUpdateInput {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.visibility.is_none()
            && self.add_rules.is_empty()
            && self.remove_rules.is_empty()
            && self.update_rules.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRateLimit {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub practice_type: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub default: Option<bool>,
    #[serde(default)]
    pub rules: Option<Vec<RemoteRule>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteRule {
    pub id: String,
    #[serde(rename = "URI")]
    pub uri: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub action: String,
}

impl From<RemoteRule> for RateLimitRule {
    fn from(rule: RemoteRule) -> Self {
        Self {
            id: rule.id,
            uri: rule.uri,
            scope: rule.scope,
            limit: rule.limit,
            comment: rule.comment.unwrap_or_default(),
            action: rule.action,
        }
    }
}

pub struct RateLimitPractice;

impl Resource for RateLimitPractice {
    type Desired = RateLimit;
    type Observed = RateLimit;
    type Remote = RemoteRateLimit;
    type CreateInput = RateLimitCreateInput;
    type UpdateInput = RateLimitUpdateInput;

    const KIND: &'static str = "rate_limit_practice";
    const REFERENCE: Option<ReferenceKind> = Some(ReferenceKind::Practice);

    fn create_input(desired: &RateLimit) -> Result<RateLimitCreateInput> {
        Ok(RateLimitCreateInput {
            name: desired.name.clone(),
            visibility: desired.visibility.clone(),
            rules: desired
                .rules
                .iter()
                .cloned()
                .map(|rule| RuleInput {
                    id: String::new(),
                    ..RuleInput::from(rule)
                })
                .collect(),
        })
    }

    fn update_input(observed: &RateLimit, desired: &RateLimit) -> Result<RateLimitUpdateInput> {
        let rules = keyed_diff(
            &observed.rules,
            &desired.rules,
            |rule| rule.uri.clone(),
            RateLimitRule::differs,
        );

        Ok(RateLimitUpdateInput {
            name: changed(&observed.name, &desired.name),
            visibility: changed(&observed.visibility, &desired.visibility),
            add_rules: rules
                .added
                .into_iter()
                .map(|rule| RuleInput {
                    id: String::new(),
                    ..RuleInput::from(rule)
                })
                .collect(),
            remove_rules: rules.removed.into_iter().map(|rule| rule.id).collect(),
            update_rules: rules
                .updated
                .into_iter()
                .map(|(before, after)| RuleInput {
                    id: before.id,
                    ..RuleInput::from(after)
                })
                .collect(),
        })
    }

    fn render(remote: RemoteRateLimit) -> Result<RateLimit> {
        Ok(RateLimit {
            id: remote.id,
            name: remote.name,
            visibility: remote.visibility.unwrap_or_else(default_visibility),
            rules: remote
                .rules
                .unwrap_or_default()
                .into_iter()
                .map(RateLimitRule::from)
                .collect(),
            practice_type: remote.practice_type.unwrap_or_default(),
            category: remote.category.unwrap_or_default(),
            default: remote.default.unwrap_or_default(),
        })
    }

    fn remote_id(remote: &RemoteRateLimit) -> &str {
        &remote.id
    }

    fn observed_id(observed: &RateLimit) -> &str {
        &observed.id
    }
}

macro_rules! rate_limit_fields {
    () => {
        "id name practiceType visibility category default rules { id URI scope limit comment action }"
    };
}

impl GraphqlResource for RateLimitPractice {
    const CREATE: Document = Document {
        operation: "newRateLimitPractice",
        query: concat!(
            "mutation newRateLimitPractice($practiceInput: RateLimitPracticeInput, $ownerId: ID, $mainMode: PracticeMode, $subPracticeModes: [PracticeModeInput]) ",
            "{ newRateLimitPractice(practiceInput: $practiceInput, ownerId: $ownerId, mainMode: $mainMode, subPracticeModes: $subPracticeModes) { ",
            rate_limit_fields!(),
            " } }"
        ),
    };
    const FETCH: Document = Document {
        operation: "getRateLimitPractice",
        query: concat!(
            "query getRateLimitPractice($id: ID!) { getRateLimitPractice(id: $id) { ",
            rate_limit_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateRateLimitPractice",
        query: "mutation updateRateLimitPractice($practiceInput: RateLimitPracticeUpdateInput, $id: ID!, $ownerId: ID) { updateRateLimitPractice(practiceInput: $practiceInput, id: $id, ownerId: $ownerId) }",
    };
    const DELETE: Document = Document {
        operation: "deletePractice",
        query: "mutation deletePractice($id: ID!) { deletePractice(id: $id) }",
    };
    const INPUT: &'static str = "practiceInput";
}
