//! Web-application practices: IPS, web attacks and web bot blocks.

use super::{changed, default_visibility};
use crate::backend::{Document, GraphqlResource};
use reconcile::codec::{self, Separator};
use reconcile::{Mutation, Presence, ReferenceKind, Resource, Result, diff_values};
use serde::{Deserialize, Serialize};

// ============================================================================
// Declared / Observed State
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ips {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protections_from_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_confidence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedSetting {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_protection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_disclosure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_object_depth: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub illegal_http_methods: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAttacks {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_setting: Option<AdvancedSetting>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebBot {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub inject_uris: Vec<String>,
    /// `uri;;;id` for every observed inject URI.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inject_uris_ids: Vec<String>,
    #[serde(default)]
    pub valid_uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_uris_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPractice {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ips: Option<Ips>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_attacks: Option<WebAttacks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_bot: Option<WebBot>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub practice_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default)]
    pub default: bool,
}

/// The declared value of a block field, if it differs from the observed one.
///
/// Undeclared fields are left to the backend, so they never count as a change.
pub(crate) fn declared_change<T: PartialEq + Clone>(old: Option<&T>, new: Option<&T>) -> Option<T> {
    new.filter(|value| old != Some(*value)).cloned()
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpsInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protections_from_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_confidence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium_confidence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_confidence: Option<String>,
}

impl IpsInput {
    /// Only the declared fields of `new` that differ from `old`.
    pub(crate) fn changes(old: &Ips, new: &Ips) -> Self {
        let pick = |field: fn(&Ips) -> Option<&String>| declared_change(field(old), field(new));
        Self {
            id: old.id.clone(),
            performance_impact: pick(|ips| ips.performance_impact.as_ref()),
            severity_level: pick(|ips| ips.severity_level.as_ref()),
            protections_from_year: pick(|ips| ips.protections_from_year.as_ref()).map(year_input),
            high_confidence: pick(|ips| ips.high_confidence.as_ref()),
            medium_confidence: pick(|ips| ips.medium_confidence.as_ref()),
            low_confidence: pick(|ips| ips.low_confidence.as_ref()),
        }
    }

    pub(crate) fn has_changes(&self) -> bool {
        self.performance_impact.is_some()
            || self.severity_level.is_some()
            || self.protections_from_year.is_some()
            || self.high_confidence.is_some()
            || self.medium_confidence.is_some()
            || self.low_confidence.is_some()
    }

    pub(crate) fn new(ips: &Ips, id: &str) -> Self {
        Self {
            id: id.to_string(),
            performance_impact: ips.performance_impact.clone(),
            severity_level: ips.severity_level.clone(),
            protections_from_year: ips.protections_from_year.clone().map(year_input),
            high_confidence: ips.high_confidence.clone(),
            medium_confidence: ips.medium_confidence.clone(),
            low_confidence: ips.low_confidence.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSettingInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "CSRFProtection", skip_serializing_if = "Option::is_none")]
    pub csrf_protection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_disclosure: Option<String>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub body_size: Presence<i64>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub url_size: Presence<i64>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub header_size: Presence<i64>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub max_object_depth: Presence<i64>,
    /// `Yes` or `No`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub illegal_http_methods: Option<String>,
}

impl AdvancedSettingInput {
    /// Payload for `new`, relative to `old` when the block already exists.
    fn new(old: Option<&AdvancedSetting>, new: &AdvancedSetting) -> Self {
        let numeric = |field: fn(&AdvancedSetting) -> Option<i64>| match old {
            Some(old) => Presence::of_change(field(old).as_ref(), field(new).as_ref()),
            None => Presence::of_declared(field(new).as_ref()),
        };
        let text = |field: fn(&AdvancedSetting) -> Option<&String>| match old {
            Some(old) => declared_change(field(old), field(new)),
            None => field(new).cloned(),
        };
        let illegal_http_methods = match old {
            Some(old) => declared_change(
                old.illegal_http_methods.as_ref(),
                new.illegal_http_methods.as_ref(),
            ),
            None => new.illegal_http_methods,
        };
        Self {
            id: old.map(|s| s.id.clone()).unwrap_or_default(),
            csrf_protection: text(|s| s.csrf_protection.as_ref()),
            open_redirect: text(|s| s.open_redirect.as_ref()),
            error_disclosure: text(|s| s.error_disclosure.as_ref()),
            body_size: numeric(|s| s.body_size),
            url_size: numeric(|s| s.url_size),
            header_size: numeric(|s| s.header_size),
            max_object_depth: numeric(|s| s.max_object_depth),
            illegal_http_methods: illegal_http_methods
                .map(|allowed| (if allowed { "Yes" } else { "No" }).to_string()),
        }
    }

    fn has_changes(&self) -> bool {
        self.csrf_protection.is_some()
            || self.open_redirect.is_some()
            || self.error_disclosure.is_some()
            || self.body_size.is_present()
            || self.url_size.is_present()
            || self.header_size.is_present()
            || self.max_object_depth.is_present()
            || self.illegal_http_methods.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAttacksInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced_setting: Option<AdvancedSettingInput>,
}

impl WebAttacksInput {
    /// Payload for `new`, relative to `old` when the block already exists.
    fn new(old: Option<&WebAttacks>, new: &WebAttacks) -> Self {
        let old_setting = old.and_then(|w| w.advanced_setting.as_ref());
        let advanced_setting = new
            .advanced_setting
            .as_ref()
            .map(|setting| AdvancedSettingInput::new(old_setting, setting))
            .filter(|setting| old_setting.is_none() || setting.has_changes());
        Self {
            id: old.map(|w| w.id.clone()).unwrap_or_default(),
            minimum_severity: match old {
                Some(old) => {
                    declared_change(old.minimum_severity.as_ref(), new.minimum_severity.as_ref())
                }
                None => new.minimum_severity.clone(),
            },
            advanced_setting,
        }
    }

    fn has_changes(&self) -> bool {
        self.minimum_severity.is_some() || self.advanced_setting.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebBotCreateInput {
    #[serde(rename = "injectURIs")]
    pub inject_uris: Vec<String>,
    #[serde(rename = "validURIs")]
    pub valid_uris: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebBotUpdateInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "addInjectURIs", skip_serializing_if = "Vec::is_empty")]
    pub add_inject_uris: Vec<String>,
    #[serde(rename = "removeInjectURIs", skip_serializing_if = "Vec::is_empty")]
    pub remove_inject_uris: Vec<String>,
    #[serde(rename = "addValidURIs", skip_serializing_if = "Vec::is_empty")]
    pub add_valid_uris: Vec<String>,
    #[serde(rename = "removeValidURIs", skip_serializing_if = "Vec::is_empty")]
    pub remove_valid_uris: Vec<String>,
}

impl WebBotUpdateInput {
    fn is_empty(&self) -> bool {
        self.add_inject_uris.is_empty()
            && self.remove_inject_uris.is_empty()
            && self.add_valid_uris.is_empty()
            && self.remove_valid_uris.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebPracticeCreateInput {
    pub name: String,
    pub visibility: String,
    #[serde(rename = "IPS", skip_serializing_if = "Option::is_none")]
    pub ips: Option<IpsInput>,
    #[serde(rename = "WebBot", skip_serializing_if = "Option::is_none")]
    pub web_bot: Option<WebBotCreateInput>,
    #[serde(rename = "WebAttacks", skip_serializing_if = "Option::is_none")]
    pub web_attacks: Option<WebAttacksInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebPracticeUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(rename = "IPS", skip_serializing_if = "Option::is_none")]
    pub ips: Option<IpsInput>,
    #[serde(rename = "WebAttacks", skip_serializing_if = "Option::is_none")]
    pub web_attacks: Option<WebAttacksInput>,
    #[serde(rename = "WebBot", skip_serializing_if = "Option::is_none")]
    pub web_bot: Option<WebBotUpdateInput>,
}

impl Mutation for WebPracticeUpdateInput {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.visibility.is_none()
            && self.ips.is_none()
            && self.web_attacks.is_none()
            && self.web_bot.is_none()
    }
}

// ============================================================================
// Backend Objects
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteIps {
    #[serde(default)]
    pub id: String,
    pub performance_impact: Option<String>,
    pub severity_level: Option<String>,
    pub protections_from_year: Option<String>,
    pub high_confidence: Option<String>,
    pub medium_confidence: Option<String>,
    pub low_confidence: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAdvancedSetting {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "CSRFProtection")]
    pub csrf_protection: Option<String>,
    pub open_redirect: Option<String>,
    pub error_disclosure: Option<String>,
    pub body_size: Option<i64>,
    pub url_size: Option<i64>,
    pub header_size: Option<i64>,
    pub max_object_depth: Option<i64>,
    pub illegal_http_methods: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWebAttacks {
    #[serde(default)]
    pub id: String,
    pub minimum_severity: Option<String>,
    pub advanced_setting: Option<RemoteAdvancedSetting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteUri {
    pub id: String,
    #[serde(rename = "URI")]
    pub uri: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteWebBot {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "injectURIs", default)]
    pub inject_uris: Option<Vec<RemoteUri>>,
    #[serde(rename = "validURIs", default)]
    pub valid_uris: Option<Vec<RemoteUri>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWebPractice {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub visibility: Option<String>,
    pub practice_type: Option<String>,
    pub category: Option<String>,
    pub default: Option<bool>,
    #[serde(rename = "IPS")]
    pub ips: Option<RemoteIps>,
    #[serde(rename = "WebAttacks")]
    pub web_attacks: Option<RemoteWebAttacks>,
    #[serde(rename = "WebBot")]
    pub web_bot: Option<RemoteWebBot>,
}

// ============================================================================
// Conversions
// ============================================================================

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// The backend stores protection years as `Y<year>`.
fn year_input(year: String) -> String {
    if year.starts_with('Y') { year } else { format!("Y{year}") }
}

pub(crate) fn render_ips(ips: RemoteIps) -> Ips {
    Ips {
        id: ips.id,
        performance_impact: non_empty(ips.performance_impact),
        severity_level: non_empty(ips.severity_level),
        protections_from_year: non_empty(ips.protections_from_year)
            .map(|year| year.trim_start_matches('Y').to_string()),
        high_confidence: non_empty(ips.high_confidence),
        medium_confidence: non_empty(ips.medium_confidence),
        low_confidence: non_empty(ips.low_confidence),
    }
}

fn render_uris(uris: Option<Vec<RemoteUri>>) -> (Vec<String>, Vec<String>) {
    let uris = uris.unwrap_or_default();
    let ids = uris
        .iter()
        .map(|u| codec::encode(&u.uri, &u.id, Separator::Value))
        .collect();
    (uris.into_iter().map(|u| u.uri).collect(), ids)
}

fn web_bot_update(old: Option<&WebBot>, new: &WebBot) -> Result<WebBotUpdateInput> {
    let Some(old) = old else {
        return Ok(WebBotUpdateInput {
            add_inject_uris: new.inject_uris.clone(),
            add_valid_uris: new.valid_uris.clone(),
            ..WebBotUpdateInput::default()
        });
    };

    let inject = diff_values(&old.inject_uris, &new.inject_uris);
    let inject_ids = codec::index_ids(&old.inject_uris_ids, Separator::Value)?;
    let valid = diff_values(&old.valid_uris, &new.valid_uris);
    let valid_ids = codec::index_ids(&old.valid_uris_ids, Separator::Value)?;

    Ok(WebBotUpdateInput {
        id: old.id.clone(),
        remove_inject_uris: codec::resolve_ids(&inject.removed, &inject_ids, Separator::Value)?,
        add_inject_uris: inject.added,
        remove_valid_uris: codec::resolve_ids(&valid.removed, &valid_ids, Separator::Value)?,
        add_valid_uris: valid.added,
    })
}

pub struct WebApplicationPractice;

impl Resource for WebApplicationPractice {
    type Desired = WebPractice;
    type Observed = WebPractice;
    type Remote = RemoteWebPractice;
    type CreateInput = WebPracticeCreateInput;
    type UpdateInput = WebPracticeUpdateInput;

    const KIND: &'static str = "web_application_practice";
    const REFERENCE: Option<ReferenceKind> = Some(ReferenceKind::Practice);

    fn create_input(desired: &WebPractice) -> Result<WebPracticeCreateInput> {
        Ok(WebPracticeCreateInput {
            name: desired.name.clone(),
            visibility: desired.visibility.clone(),
            ips: desired.ips.as_ref().map(|ips| IpsInput::new(ips, "")),
            web_bot: desired.web_bot.as_ref().map(|bot| WebBotCreateInput {
                inject_uris: bot.inject_uris.clone(),
                valid_uris: bot.valid_uris.clone(),
            }),
            web_attacks: desired
                .web_attacks
                .as_ref()
                .map(|attacks| WebAttacksInput::new(None, attacks)),
        })
    }

    fn update_input(observed: &WebPractice, desired: &WebPractice) -> Result<WebPracticeUpdateInput> {
        let mut input = WebPracticeUpdateInput {
            name: changed(&observed.name, &desired.name),
            visibility: changed(&observed.visibility, &desired.visibility),
            ..WebPracticeUpdateInput::default()
        };

        if let Some(ips) = &desired.ips {
            input.ips = match &observed.ips {
                Some(old) => Some(IpsInput::changes(old, ips)).filter(IpsInput::has_changes),
                None => Some(IpsInput::new(ips, "")),
            };
        }

        if let Some(attacks) = &desired.web_attacks {
            let update = WebAttacksInput::new(observed.web_attacks.as_ref(), attacks);
            if observed.web_attacks.is_none() || update.has_changes() {
                input.web_attacks = Some(update);
            }
        }

        if let Some(bot) = &desired.web_bot {
            let update = web_bot_update(observed.web_bot.as_ref(), bot)?;
            if !update.is_empty() {
                input.web_bot = Some(update);
            }
        }

        Ok(input)
    }

    fn render(remote: RemoteWebPractice) -> Result<WebPractice> {
        let ips = remote.ips.map(render_ips);

        let web_attacks = remote.web_attacks.map(|attacks| WebAttacks {
            id: attacks.id,
            minimum_severity: non_empty(attacks.minimum_severity),
            advanced_setting: attacks.advanced_setting.map(|setting| AdvancedSetting {
                id: setting.id,
                csrf_protection: non_empty(setting.csrf_protection),
                open_redirect: non_empty(setting.open_redirect),
                error_disclosure: non_empty(setting.error_disclosure),
                body_size: setting.body_size,
                url_size: setting.url_size,
                header_size: setting.header_size,
                max_object_depth: setting.max_object_depth,
                illegal_http_methods: setting.illegal_http_methods.as_deref().map(|v| v == "Yes"),
            }),
        });

        let web_bot = remote.web_bot.map(|bot| {
            let (inject_uris, inject_uris_ids) = render_uris(bot.inject_uris);
            let (valid_uris, valid_uris_ids) = render_uris(bot.valid_uris);
            WebBot {
                id: bot.id,
                inject_uris,
                inject_uris_ids,
                valid_uris,
                valid_uris_ids,
            }
        });

        Ok(WebPractice {
            id: remote.id,
            name: remote.name,
            visibility: remote.visibility.unwrap_or_else(default_visibility),
            ips,
            web_attacks,
            web_bot,
            practice_type: remote.practice_type.unwrap_or_default(),
            category: remote.category.unwrap_or_default(),
            default: remote.default.unwrap_or_default(),
        })
    }

    fn remote_id(remote: &RemoteWebPractice) -> &str {
        &remote.id
    }

    fn observed_id(observed: &WebPractice) -> &str {
        &observed.id
    }
}

macro_rules! web_practice_fields {
    () => {
        "id name practiceType category default visibility
        IPS { id performanceImpact severityLevel protectionsFromYear highConfidence mediumConfidence lowConfidence }
        WebAttacks { id minimumSeverity advancedSetting { id CSRFProtection openRedirect errorDisclosure bodySize urlSize headerSize maxObjectDepth illegalHttpMethods } }
        WebBot { id injectURIs { id URI } validURIs { id URI } }"
    };
}

impl GraphqlResource for WebApplicationPractice {
    const CREATE: Document = Document {
        operation: "newWebApplicationPractice",
        query: concat!(
            "mutation newWebApplicationPractice($practiceInput: WebApplicationPracticeInput) ",
            "{ newWebApplicationPractice(practiceInput: $practiceInput) { ",
            web_practice_fields!(),
            " } }"
        ),
    };
    const FETCH: Document = Document {
        operation: "getWebApplicationPractice",
        query: concat!(
            "query getWebApplicationPractice($id: ID!) { getWebApplicationPractice(id: $id) { ",
            web_practice_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateWebApplicationPractice",
        query: "mutation updateWebApplicationPractice($practiceInput: WebApplicationPracticeUpdateInput, $id: ID!) { updateWebApplicationPractice(practiceInput: $practiceInput, id: $id) }",
    };
    const DELETE: Document = Document {
        operation: "deletePractice",
        query: "mutation deletePractice($id: ID!) { deletePractice(id: $id) }",
    };
    const INPUT: &'static str = "practiceInput";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observed() -> WebPractice {
        WebApplicationPractice::render(
            serde_json::from_value(json!({
                "id": "wp-1",
                "name": "web",
                "visibility": "Shared",
                "practiceType": "WebApplication",
                "IPS": {
                    "id": "ips-1",
                    "performanceImpact": "MediumOrLower",
                    "severityLevel": "MediumOrAbove",
                    "protectionsFromYear": "Y2016",
                    "highConfidence": "Prevent",
                    "mediumConfidence": "Prevent",
                    "lowConfidence": "Detect"
                },
                "WebAttacks": {
                    "id": "wa-1",
                    "minimumSeverity": "High",
                    "advancedSetting": {
                        "id": "adv-1",
                        "CSRFProtection": "Prevent",
                        "openRedirect": "Disabled",
                        "errorDisclosure": "AccordingToPractice",
                        "bodySize": 1_000_000,
                        "urlSize": 32768,
                        "headerSize": 102_400,
                        "maxObjectDepth": 40,
                        "illegalHttpMethods": "No"
                    }
                },
                "WebBot": {
                    "id": "bot-1",
                    "injectURIs": [{"id": "i-1", "URI": "/"}],
                    "validURIs": [{"id": "v-1", "URI": "/ok"}, {"id": "v-2", "URI": "/health"}]
                }
            }))
            .unwrap(),
        )
        .unwrap()
    }

    fn declared(observed: &WebPractice) -> WebPractice {
        let mut desired = observed.clone();
        desired.id.clear();
        if let Some(ips) = desired.ips.as_mut() {
            ips.id.clear();
        }
        if let Some(attacks) = desired.web_attacks.as_mut() {
            attacks.id.clear();
        }
        desired
    }

    #[test]
    fn test_render_maps_illegal_methods() {
        let practice = observed();
        assert_eq!(practice.ips.as_ref().unwrap().protections_from_year.as_deref(), Some("2016"));
        let setting = practice.web_attacks.unwrap().advanced_setting.unwrap();
        assert_eq!(setting.illegal_http_methods, Some(false));
        assert_eq!(practice.web_bot.unwrap().valid_uris_ids, vec!["/ok;;;v-1", "/health;;;v-2"]);
    }

    #[test]
    fn test_unchanged_blocks_are_not_sent() {
        let current = observed();
        let input = WebApplicationPractice::update_input(&current, &declared(&current)).unwrap();
        assert!(input.is_empty(), "unexpected payload: {input:?}");
    }

    #[test]
    fn test_changed_block_carries_observed_ids() {
        let current = observed();
        let mut desired = declared(&current);
        if let Some(setting) = desired.web_attacks.as_mut().and_then(|w| w.advanced_setting.as_mut()) {
            setting.max_object_depth = Some(0);
        }

        let input = WebApplicationPractice::update_input(&current, &desired).unwrap();

        let attacks = serde_json::to_value(input.web_attacks.unwrap()).unwrap();
        assert_eq!(attacks["id"], "wa-1");
        assert_eq!(attacks["advancedSetting"]["id"], "adv-1");
        assert_eq!(attacks["advancedSetting"]["maxObjectDepth"], 0);
        assert!(attacks["advancedSetting"].get("bodySize").is_none());
        assert!(attacks["advancedSetting"].get("illegalHttpMethods").is_none());
        assert!(attacks.get("minimumSeverity").is_none());
        assert!(input.ips.is_none());
    }

    #[test]
    fn test_partial_blocks_compare_declared_fields_only() {
        let current = observed();
        let desired: WebPractice = serde_json::from_value(json!({
            "name": "web",
            "ips": {"performance_impact": "MediumOrLower"},
            "web_attacks": {"minimum_severity": "High"}
        }))
        .unwrap();

        let input = WebApplicationPractice::update_input(&current, &desired).unwrap();
        assert!(input.is_empty(), "unexpected payload: {input:?}");

        let desired: WebPractice = serde_json::from_value(json!({
            "name": "web",
            "ips": {"performance_impact": "MediumOrLower", "severity_level": "High"},
            "web_attacks": {"advanced_setting": {"csrf_protection": "Prevent", "body_size": 2_000_000}}
        }))
        .unwrap();

        let input = WebApplicationPractice::update_input(&current, &desired).unwrap();
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "IPS": {"id": "ips-1", "severityLevel": "High"},
                "WebAttacks": {"id": "wa-1", "advancedSetting": {"id": "adv-1", "bodySize": 2_000_000}}
            })
        );
    }

    #[test]
    fn test_web_bot_uri_diff() {
        let current = observed();
        let mut desired = declared(&current);
        if let Some(bot) = desired.web_bot.as_mut() {
            bot.valid_uris = vec!["/ok".to_string(), "/ready".to_string()];
        }

        let input = WebApplicationPractice::update_input(&current, &desired).unwrap();

        assert_eq!(
            serde_json::to_value(input.web_bot.unwrap()).unwrap(),
            json!({"id": "bot-1", "addValidURIs": ["/ready"], "removeValidURIs": ["v-2"]})
        );
    }

    #[test]
    fn test_create_input() {
        let desired: WebPractice = serde_json::from_value(json!({
            "name": "web",
            "ips": {"performance_impact": "LowOrLower", "protections_from_year": "2020"},
            "web_bot": {"inject_uris": ["/"]}
        }))
        .unwrap();

        let input = WebApplicationPractice::create_input(&desired).unwrap();

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "name": "web",
                "visibility": "Shared",
                "IPS": {"performanceImpact": "LowOrLower", "protectionsFromYear": "Y2020"},
                "WebBot": {"injectURIs": ["/"], "validURIs": []}
            })
        );
    }
}
