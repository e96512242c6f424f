//! CloudGuard AppSec gateway profiles.

use super::changed;
use crate::backend::{Document, GraphqlResource};
use reconcile::codec::{self, Separator};
use reconcile::settings::{SettingInput, SettingUpdate, SettingsDelta};
use reconcile::{Mutation, Presence, ReferenceKind, Resource, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UPGRADE_MODE_SCHEDULED: &str = "Scheduled";

/// When a scheduled upgrade may run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeTime {
    /// `Daily`, `DaysInWeek` or `DaysInMonth`.
    pub schedule_type: String,
    /// Start hour, `HH:MM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Window length in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub week_days: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    /// `Aws`, `Azure`, `VMware` or `HyperV`.
    pub profile_sub_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_time: Option<UpgradeTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_number_of_agents: Option<i64>,
    /// Agent registration token, assigned by the backend.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authentication_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_proxy_upstream_timeout: Option<i64>,
    /// `Vault` or `Gateway`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_open_inspection: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_settings: BTreeMap<String, String>,
    /// `key;;;id` for every observed additional setting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_settings_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reverse_proxy_additional_settings: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reverse_proxy_additional_settings_ids: Vec<String>,
}

impl UpgradeTime {
    /// Whether applying `self` would change `observed`.
    ///
    /// Only the fields declared here count; the backend fills in the rest.
    fn differs_from(&self, observed: Option<&Self>) -> bool {
        let Some(observed) = observed else {
            return true;
        };
        self.schedule_type != observed.schedule_type
            || self.time.as_ref().is_some_and(|time| observed.time.as_ref() != Some(time))
            || self.duration.is_some_and(|hours| observed.duration != Some(hours))
            || (!self.week_days.is_empty() && self.week_days != observed.week_days)
            || (!self.days.is_empty() && self.days != observed.days)
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeTimeInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub schedule_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub time: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub week_days: Vec<String>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub duration: Presence<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<i64>,
}

impl From<&UpgradeTime> for UpgradeTimeInput {
    fn from(time: &UpgradeTime) -> Self {
        Self {
            schedule_type: time.schedule_type.clone(),
            time: time.time.clone().unwrap_or_default(),
            week_days: time.week_days.clone(),
            duration: Presence::of_declared(time.duration.as_ref()),
            days: time.days.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationInput {
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub max_number_of_agents: Presence<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCreateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_time: Option<UpgradeTimeInput>,
    pub name: String,
    pub profile_sub_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub upgrade_mode: String,
    pub additional_settings: Vec<SettingInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reverse_proxy_additional_settings: Vec<SettingInput>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub reverse_proxy_upstream_timeout: Presence<i64>,
    pub authentication: AuthenticationInput,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub certificate_type: String,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub fail_open_inspection: Presence<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_time: Option<UpgradeTimeInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_sub_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_additional_settings: Vec<SettingInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_additional_settings: Vec<SettingUpdate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_additional_settings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_reverse_proxy_additional_settings: Vec<SettingInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_reverse_proxy_additional_settings: Vec<SettingUpdate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_reverse_proxy_additional_settings: Vec<String>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub reverse_proxy_upstream_timeout: Presence<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub fail_open_inspection: Presence<bool>,
}

impl Mutation for ProfileUpdateInput {
    fn is_empty(&self) -> bool {
        self.upgrade_time.is_none()
            && self.name.is_none()
            && self.profile_sub_type.is_none()
            && self.upgrade_mode.is_none()
            && self.add_additional_settings.is_empty()
            && self.update_additional_settings.is_empty()
            && self.remove_additional_settings.is_empty()
            && self.add_reverse_proxy_additional_settings.is_empty()
            && self.update_reverse_proxy_additional_settings.is_empty()
            && self.remove_reverse_proxy_additional_settings.is_empty()
            && self.reverse_proxy_upstream_timeout.is_absent()
            && self.authentication.is_none()
            && self.certificate_type.is_none()
            && self.fail_open_inspection.is_absent()
    }
}

// ============================================================================
// Backend Objects
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAuthentication {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub max_number_of_agents: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUpgradeTime {
    #[serde(default)]
    pub schedule_type: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub week_days: Option<Vec<String>>,
    #[serde(default)]
    pub days: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteKeyValue {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_type: Option<String>,
    #[serde(default)]
    pub profile_sub_type: Option<String>,
    #[serde(default)]
    pub upgrade_mode: Option<String>,
    #[serde(default)]
    pub upgrade_time: Option<RemoteUpgradeTime>,
    #[serde(default)]
    pub authentication: Option<RemoteAuthentication>,
    #[serde(default)]
    pub additional_settings: Option<Vec<RemoteKeyValue>>,
    #[serde(default)]
    pub reverse_proxy_upstream_timeout: Option<i64>,
    #[serde(default)]
    pub reverse_proxy_additional_settings: Option<Vec<RemoteKeyValue>>,
    #[serde(default)]
    pub certificate_type: Option<String>,
    #[serde(default)]
    pub fail_open_inspection: Option<bool>,
}

// ============================================================================
// Conversions
// ============================================================================

fn setting_inputs(settings: &BTreeMap<String, String>) -> Vec<SettingInput> {
    settings
        .iter()
        .map(|(key, value)| SettingInput {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

/// Diff a key/value map, recovering setting IDs from `key;;;id` entries.
fn settings_delta(
    old: &BTreeMap<String, String>,
    old_ids: &[String],
    new: &BTreeMap<String, String>,
) -> Result<SettingsDelta> {
    let ids = codec::index_ids(old_ids, Separator::Value)?;
    let mut delta = SettingsDelta::default();

    for (key, value) in new {
        match old.get(key) {
            None => delta.add(key.as_str(), value.as_str()),
            Some(previous) if previous == value => {}
            Some(_) => {
                if !ids.contains_key(key) {
                    log::warn!("Setting {key} has no recorded id, re-adding it with the new value");
                }
                delta.upsert(ids.get(key).map(String::as_str), key, value);
            }
        }
    }

    for key in old.keys().filter(|key| !new.contains_key(*key)) {
        match ids.get(key) {
            Some(id) => delta.remove(Some(id.as_str())),
            None => log::warn!("Setting {key} has no recorded id, leaving it"),
        }
    }
    Ok(delta)
}

fn render_settings(settings: Option<Vec<RemoteKeyValue>>) -> (BTreeMap<String, String>, Vec<String>) {
    let settings = settings.unwrap_or_default();
    let ids = settings
        .iter()
        .map(|s| codec::encode(&s.key, &s.id, Separator::Value))
        .collect();
    let values = settings.into_iter().map(|s| (s.key, s.value)).collect();
    (values, ids)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Upgrade mode in effect after this update.
fn effective_mode<'a>(observed: &'a GatewayProfile, desired: &'a GatewayProfile) -> &'a str {
    desired
        .upgrade_mode
        .as_deref()
        .or(observed.upgrade_mode.as_deref())
        .unwrap_or_default()
}

pub struct AppSecGatewayProfile;

impl Resource for AppSecGatewayProfile {
    type Desired = GatewayProfile;
    type Observed = GatewayProfile;
    type Remote = RemoteProfile;
    type CreateInput = ProfileCreateInput;
    type UpdateInput = ProfileUpdateInput;

    const KIND: &'static str = "appsec_gateway_profile";
    const REFERENCE: Option<ReferenceKind> = Some(ReferenceKind::Profile);

    fn create_input(desired: &GatewayProfile) -> Result<ProfileCreateInput> {
        let upgrade_mode = desired.upgrade_mode.clone().unwrap_or_default();
        let upgrade_time = (upgrade_mode == UPGRADE_MODE_SCHEDULED)
            .then(|| desired.upgrade_time.as_ref().map(UpgradeTimeInput::from))
            .flatten();

        Ok(ProfileCreateInput {
            upgrade_time,
            name: desired.name.clone(),
            profile_sub_type: desired.profile_sub_type.clone(),
            upgrade_mode,
            additional_settings: setting_inputs(&desired.additional_settings),
            reverse_proxy_additional_settings: setting_inputs(&desired.reverse_proxy_additional_settings),
            reverse_proxy_upstream_timeout: Presence::of_declared(desired.reverse_proxy_upstream_timeout.as_ref()),
            authentication: AuthenticationInput {
                max_number_of_agents: Presence::of_declared(desired.max_number_of_agents.as_ref()),
            },
            certificate_type: desired.certificate_type.clone().unwrap_or_default(),
            fail_open_inspection: Presence::of_declared(desired.fail_open_inspection.as_ref()),
        })
    }

    fn update_input(observed: &GatewayProfile, desired: &GatewayProfile) -> Result<ProfileUpdateInput> {
        let mut input = ProfileUpdateInput {
            name: changed(&observed.name, &desired.name),
            profile_sub_type: changed(&observed.profile_sub_type, &desired.profile_sub_type),
            upgrade_mode: desired.upgrade_mode.clone().filter(|mode| observed.upgrade_mode.as_ref() != Some(mode)),
            reverse_proxy_upstream_timeout: Presence::of_change(
                observed.reverse_proxy_upstream_timeout.as_ref(),
                desired.reverse_proxy_upstream_timeout.as_ref(),
            ),
            certificate_type: desired
                .certificate_type
                .clone()
                .filter(|kind| observed.certificate_type.as_ref() != Some(kind)),
            fail_open_inspection: Presence::of_change(
                observed.fail_open_inspection.as_ref(),
                desired.fail_open_inspection.as_ref(),
            ),
            ..ProfileUpdateInput::default()
        };

        if effective_mode(observed, desired) == UPGRADE_MODE_SCHEDULED
            && let Some(time) = &desired.upgrade_time
            && time.differs_from(observed.upgrade_time.as_ref())
        {
            input.upgrade_time = Some(UpgradeTimeInput::from(time));
        }

        let agents = Presence::of_change(
            observed.max_number_of_agents.as_ref(),
            desired.max_number_of_agents.as_ref(),
        );
        if agents.is_present() {
            input.authentication = Some(AuthenticationInput {
                max_number_of_agents: agents,
            });
        }

        let settings = settings_delta(
            &observed.additional_settings,
            &observed.additional_settings_ids,
            &desired.additional_settings,
        )?;
        input.add_additional_settings = settings.add;
        input.update_additional_settings = settings.update;
        input.remove_additional_settings = settings.remove;

        let settings = settings_delta(
            &observed.reverse_proxy_additional_settings,
            &observed.reverse_proxy_additional_settings_ids,
            &desired.reverse_proxy_additional_settings,
        )?;
        input.add_reverse_proxy_additional_settings = settings.add;
        input.update_reverse_proxy_additional_settings = settings.update;
        input.remove_reverse_proxy_additional_settings = settings.remove;

        Ok(input)
    }

    fn render(remote: RemoteProfile) -> Result<GatewayProfile> {
        let (additional_settings, additional_settings_ids) = render_settings(remote.additional_settings);
        let (reverse_proxy_additional_settings, reverse_proxy_additional_settings_ids) =
            render_settings(remote.reverse_proxy_additional_settings);
        let authentication = remote.authentication.unwrap_or_default();

        Ok(GatewayProfile {
            id: remote.id,
            name: remote.name,
            profile_sub_type: remote.profile_sub_type.unwrap_or_default(),
            profile_type: remote.profile_type.unwrap_or_default(),
            upgrade_mode: non_empty(remote.upgrade_mode),
            upgrade_time: remote.upgrade_time.map(|time| UpgradeTime {
                schedule_type: time.schedule_type.unwrap_or_default(),
                time: non_empty(time.time),
                duration: time.duration,
                week_days: time.week_days.unwrap_or_default(),
                days: time.days.unwrap_or_default(),
            }),
            max_number_of_agents: authentication.max_number_of_agents,
            authentication_token: authentication.token.unwrap_or_default(),
            reverse_proxy_upstream_timeout: remote.reverse_proxy_upstream_timeout,
            certificate_type: non_empty(remote.certificate_type),
            fail_open_inspection: remote.fail_open_inspection,
            additional_settings,
            additional_settings_ids,
            reverse_proxy_additional_settings,
            reverse_proxy_additional_settings_ids,
        })
    }

    fn remote_id(remote: &RemoteProfile) -> &str {
        &remote.id
    }

    fn observed_id(observed: &GatewayProfile) -> &str {
        &observed.id
    }
}

macro_rules! profile_fields {
    () => {
        "id name profileType profileSubType
        authentication { token maxNumberOfAgents }
        additionalSettings { id key value }
        upgradeMode
        upgradeTime { scheduleType duration time ... on ScheduleDaysInWeek { weekDays } ... on ScheduleDaysInMonth { days } }
        reverseProxyUpstreamTimeout
        reverseProxyAdditionalSettings { id key value }
        certificateType failOpenInspection"
    };
}

impl GraphqlResource for AppSecGatewayProfile {
    const CREATE: Document = Document {
        operation: "newCloudGuardAppSecGatewayProfile",
        query: concat!(
            "mutation newCloudGuardAppSecGatewayProfile($profileInput: CloudGuardAppSecGatewayProfileInput) ",
            "{ newCloudGuardAppSecGatewayProfile(profileInput: $profileInput) { ",
            profile_fields!(),
            " } }"
        ),
    };
    const FETCH: Document = Document {
        operation: "getCloudGuardAppSecGatewayProfile",
        query: concat!(
            "query getCloudGuardAppSecGatewayProfile($id: ID!) { getCloudGuardAppSecGatewayProfile(id: $id) { ",
            profile_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateCloudGuardAppSecGatewayProfile",
        query: "mutation updateCloudGuardAppSecGatewayProfile($profileInput: CloudGuardAppSecGatewayProfileUpdateInput, $id: ID!) { updateCloudGuardAppSecGatewayProfile(profileInput: $profileInput, id: $id) }",
    };
    const DELETE: Document = Document {
        operation: "deleteProfile",
        query: "mutation deleteProfile($id: ID!) { deleteProfile(id: $id) }",
    };
    const INPUT: &'static str = "profileInput";
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::Error;
    use serde_json::json;

    fn remote() -> RemoteProfile {
        serde_json::from_value(json!({
            "id": "gw-1",
            "name": "edge",
            "profileType": "CloudGuardAppSecGateway",
            "profileSubType": "Aws",
            "authentication": {"token": "cp-123", "maxNumberOfAgents": 10},
            "additionalSettings": [
                {"id": "s-1", "key": "k1", "value": "v1"},
                {"id": "s-2", "key": "k2", "value": "v2"}
            ],
            "upgradeMode": "Scheduled",
            "upgradeTime": {"scheduleType": "DaysInWeek", "duration": 4, "time": "22:00", "weekDays": ["Monday"]},
            "reverseProxyUpstreamTimeout": 3600,
            "reverseProxyAdditionalSettings": null,
            "certificateType": "Vault",
            "failOpenInspection": false
        }))
        .unwrap()
    }

    fn observed() -> GatewayProfile {
        AppSecGatewayProfile::render(remote()).unwrap()
    }

    fn declared(observed: &GatewayProfile) -> GatewayProfile {
        GatewayProfile {
            id: String::new(),
            profile_type: String::new(),
            authentication_token: String::new(),
            additional_settings_ids: Vec::new(),
            ..observed.clone()
        }
    }

    #[test]
    fn test_render() {
        let profile = observed();
        assert_eq!(profile.authentication_token, "cp-123");
        assert_eq!(profile.max_number_of_agents, Some(10));
        assert_eq!(profile.additional_settings_ids, vec!["k1;;;s-1", "k2;;;s-2"]);
        assert_eq!(profile.upgrade_time.as_ref().unwrap().week_days, vec!["Monday"]);
        assert!(profile.reverse_proxy_additional_settings.is_empty());
    }

    #[test]
    fn test_name_only_change_leaves_agents_out() {
        let current = observed();
        let mut desired = declared(&current);
        desired.name = "edge-2".to_string();

        let input = AppSecGatewayProfile::update_input(&current, &desired).unwrap();

        assert!(input.authentication.is_none());
        assert_eq!(serde_json::to_value(&input).unwrap(), json!({"name": "edge-2"}));
    }

    #[test]
    fn test_zero_agents_is_sent() {
        let current = observed();
        let mut desired = declared(&current);
        desired.max_number_of_agents = Some(0);

        let input = AppSecGatewayProfile::update_input(&current, &desired).unwrap();

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"authentication": {"maxNumberOfAgents": 0}})
        );
    }

    #[test]
    fn test_settings_delta_uses_recorded_ids() {
        let current = observed();
        let mut desired = declared(&current);
        desired.additional_settings = BTreeMap::from([
            ("k1".to_string(), "changed".to_string()),
            ("k3".to_string(), "v3".to_string()),
        ]);

        let input = AppSecGatewayProfile::update_input(&current, &desired).unwrap();

        assert_eq!(input.update_additional_settings[0].id, "s-1");
        assert_eq!(input.update_additional_settings[0].value, "changed");
        assert_eq!(input.add_additional_settings[0].key, "k3");
        assert_eq!(input.remove_additional_settings, vec!["s-2"]);
    }

    #[test]
    fn test_setting_without_id_is_readded() {
        let old = BTreeMap::from([("k1".to_string(), "v1".to_string()), ("k2".to_string(), "v2".to_string())]);
        let new = BTreeMap::from([("k1".to_string(), "v9".to_string())]);

        let delta = settings_delta(&old, &[], &new).unwrap();

        assert_eq!(delta.add.len(), 1);
        assert_eq!(delta.add[0].value, "v9");
        assert!(delta.update.is_empty());
        assert!(delta.remove.is_empty());
    }

    #[test]
    fn test_malformed_setting_id() {
        let old = BTreeMap::from([("k1".to_string(), "v1".to_string())]);
        let err = settings_delta(&old, &["k1-s-1".to_string()], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::MalformedCompositeId { .. }));
    }

    #[test]
    fn test_upgrade_time_only_when_scheduled() {
        let current = observed();
        let mut desired = declared(&current);
        if let Some(time) = desired.upgrade_time.as_mut() {
            time.time = Some("23:00".to_string());
        }

        let input = AppSecGatewayProfile::update_input(&current, &desired).unwrap();
        assert_eq!(input.upgrade_time.as_ref().unwrap().time, "23:00");

        desired.upgrade_mode = Some("Automatic".to_string());
        let input = AppSecGatewayProfile::update_input(&current, &desired).unwrap();
        assert!(input.upgrade_time.is_none());
        assert_eq!(input.upgrade_mode.as_deref(), Some("Automatic"));
    }

    #[test]
    fn test_partial_upgrade_time_matching_observed_is_unchanged() {
        let current = observed();
        let mut desired = declared(&current);
        desired.upgrade_time = Some(UpgradeTime {
            schedule_type: "DaysInWeek".to_string(),
            time: Some("22:00".to_string()),
            ..UpgradeTime::default()
        });

        let input = AppSecGatewayProfile::update_input(&current, &desired).unwrap();
        assert!(input.is_empty());

        if let Some(time) = desired.upgrade_time.as_mut() {
            time.duration = Some(6);
        }
        let input = AppSecGatewayProfile::update_input(&current, &desired).unwrap();
        assert_eq!(input.upgrade_time.as_ref().unwrap().duration, Presence::ExplicitValue(6));
    }

    #[test]
    fn test_create_input() {
        let desired: GatewayProfile = serde_json::from_value(json!({
            "name": "edge",
            "profile_sub_type": "Azure",
            "upgrade_mode": "Manual",
            "upgrade_time": {"schedule_type": "Daily", "time": "01:00"},
            "max_number_of_agents": 5,
            "additional_settings": {"a": "1"}
        }))
        .unwrap();

        let input = AppSecGatewayProfile::create_input(&desired).unwrap();

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "name": "edge",
                "profileSubType": "Azure",
                "upgradeMode": "Manual",
                "additionalSettings": [{"key": "a", "value": "1"}],
                "authentication": {"maxNumberOfAgents": 5}
            })
        );
    }
}
