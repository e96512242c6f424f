//! Log triggers: which events are logged and where they are sent.
//!
//! Flags left out of the manifest keep whatever the backend chose, so an
//! update only carries the flags whose declared value differs.

use super::web_practice::{declared_change, non_empty};
use crate::backend::{Document, GraphqlResource};
use reconcile::{Mutation, ReferenceKind, Resource, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_VERBOSITY: &str = "Standard";

fn default_verbosity() -> String {
    DEFAULT_VERBOSITY.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTrigger {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    /// `Standard`, `Minimal` or `Extended`.
    #[serde(default = "default_verbosity")]
    pub verbosity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control_allow_events: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control_drop_events: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_prevention_detect_events: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_prevention_prevent_events: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_requests: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url_path: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url_query: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_headers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_body: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_to_cloud: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_to_agent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extend_logging: Option<bool>,
    /// `High` or `Critical`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extend_logging_min_severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_to_syslog: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_ip_address: Option<String>,
    /// `UDP` or `TCP`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_to_cef: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cef_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cef_protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cef_port: Option<i64>,
}

/// Create and update payload.
///
/// The backend requires `name` and `verbosity` on every update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogTriggerInput {
    pub name: String,
    pub verbosity: String,
    /// Set when `name` or `verbosity` differ from the observed values.
    #[serde(skip)]
    pub renamed: bool,
    #[serde(rename = "acAllow", skip_serializing_if = "Option::is_none")]
    pub access_control_allow_events: Option<bool>,
    #[serde(rename = "acDrop", skip_serializing_if = "Option::is_none")]
    pub access_control_drop_events: Option<bool>,
    #[serde(rename = "tpDetect", skip_serializing_if = "Option::is_none")]
    pub threat_prevention_detect_events: Option<bool>,
    #[serde(rename = "tpPrevent", skip_serializing_if = "Option::is_none")]
    pub threat_prevention_prevent_events: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_requests: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url_path: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url_query: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_headers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_body: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_to_cloud: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_to_agent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extend_logging: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extend_logging_min_severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_to_syslog: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog_protocol: Option<String>,
    #[serde(rename = "syslogPortNum", skip_serializing_if = "Option::is_none")]
    pub syslog_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_to_cef: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cef_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cef_protocol: Option<String>,
    #[serde(rename = "cefPortNum", skip_serializing_if = "Option::is_none")]
    pub cef_port: Option<i64>,
}

impl Mutation for LogTriggerInput {
    fn is_empty(&self) -> bool {
        !self.renamed
            && self.access_control_allow_events.is_none()
            && self.access_control_drop_events.is_none()
            && self.threat_prevention_detect_events.is_none()
            && self.threat_prevention_prevent_events.is_none()
            && self.web_requests.is_none()
            && self.web_url_path.is_none()
            && self.web_url_query.is_none()
            && self.web_headers.is_none()
            && self.web_body.is_none()
            && self.log_to_cloud.is_none()
            && self.log_to_agent.is_none()
            && self.extend_logging.is_none()
            && self.extend_logging_min_severity.is_none()
            && self.response_body.is_none()
            && self.response_code.is_none()
            && self.log_to_syslog.is_none()
            && self.syslog_ip_address.is_none()
            && self.syslog_protocol.is_none()
            && self.syslog_port.is_none()
            && self.log_to_cef.is_none()
            && self.cef_ip_address.is_none()
            && self.cef_protocol.is_none()
            && self.cef_port.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLogTrigger {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub verbosity: Option<String>,
    pub ac_allow: Option<bool>,
    pub ac_drop: Option<bool>,
    pub tp_detect: Option<bool>,
    pub tp_prevent: Option<bool>,
    pub web_requests: Option<bool>,
    pub web_url_path: Option<bool>,
    pub web_url_query: Option<bool>,
    pub web_headers: Option<bool>,
    pub web_body: Option<bool>,
    pub log_to_cloud: Option<bool>,
    pub log_to_agent: Option<bool>,
    pub extend_logging: Option<bool>,
    pub extend_logging_min_severity: Option<String>,
    pub response_body: Option<bool>,
    pub response_code: Option<bool>,
    pub log_to_syslog: Option<bool>,
    pub syslog_ip_address: Option<String>,
    pub syslog_protocol: Option<String>,
    pub syslog_port_num: Option<i64>,
    pub log_to_cef: Option<bool>,
    pub cef_ip_address: Option<String>,
    pub cef_protocol: Option<String>,
    pub cef_port_num: Option<i64>,
}

/// Ports are optional; the backend reports an unset one as zero.
fn non_zero(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

pub struct LogTriggerResource;

impl Resource for LogTriggerResource {
    type Desired = LogTrigger;
    type Observed = LogTrigger;
    type Remote = RemoteLogTrigger;
    type CreateInput = LogTriggerInput;
    type UpdateInput = LogTriggerInput;

    const KIND: &'static str = "log_trigger";
    const REFERENCE: Option<ReferenceKind> = Some(ReferenceKind::Trigger);

    fn create_input(desired: &LogTrigger) -> Result<LogTriggerInput> {
        Ok(LogTriggerInput {
            name: desired.name.clone(),
            verbosity: desired.verbosity.clone(),
            renamed: true,
            access_control_allow_events: desired.access_control_allow_events,
            access_control_drop_events: desired.access_control_drop_events,
            threat_prevention_detect_events: desired.threat_prevention_detect_events,
            threat_prevention_prevent_events: desired.threat_prevention_prevent_events,
            web_requests: desired.web_requests,
            web_url_path: desired.web_url_path,
            web_url_query: desired.web_url_query,
            web_headers: desired.web_headers,
            web_body: desired.web_body,
            log_to_cloud: desired.log_to_cloud,
            log_to_agent: desired.log_to_agent,
            extend_logging: desired.extend_logging,
            extend_logging_min_severity: desired.extend_logging_min_severity.clone(),
            response_body: desired.response_body,
            response_code: desired.response_code,
            log_to_syslog: desired.log_to_syslog,
            syslog_ip_address: desired.syslog_ip_address.clone(),
            syslog_protocol: desired.syslog_protocol.clone(),
            syslog_port: desired.syslog_port,
            log_to_cef: desired.log_to_cef,
            cef_ip_address: desired.cef_ip_address.clone(),
            cef_protocol: desired.cef_protocol.clone(),
            cef_port: desired.cef_port,
        })
    }

    fn update_input(observed: &LogTrigger, desired: &LogTrigger) -> Result<LogTriggerInput> {
        let flag = |field: fn(&LogTrigger) -> Option<bool>| {
            declared_change(field(observed).as_ref(), field(desired).as_ref())
        };
        let text = |field: fn(&LogTrigger) -> Option<&String>| {
            declared_change(field(observed), field(desired))
        };
        let port = |field: fn(&LogTrigger) -> Option<i64>| {
            declared_change(field(observed).as_ref(), field(desired).as_ref())
        };

        Ok(LogTriggerInput {
            name: desired.name.clone(),
            verbosity: desired.verbosity.clone(),
            renamed: observed.name != desired.name || observed.verbosity != desired.verbosity,
            access_control_allow_events: flag(|t| t.access_control_allow_events),
            access_control_drop_events: flag(|t| t.access_control_drop_events),
            threat_prevention_detect_events: flag(|t| t.threat_prevention_detect_events),
            threat_prevention_prevent_events: flag(|t| t.threat_prevention_prevent_events),
            web_requests: flag(|t| t.web_requests),
            web_url_path: flag(|t| t.web_url_path),
            web_url_query: flag(|t| t.web_url_query),
            web_headers: flag(|t| t.web_headers),
            web_body: flag(|t| t.web_body),
            log_to_cloud: flag(|t| t.log_to_cloud),
            log_to_agent: flag(|t| t.log_to_agent),
            extend_logging: flag(|t| t.extend_logging),
            extend_logging_min_severity: text(|t| t.extend_logging_min_severity.as_ref()),
            response_body: flag(|t| t.response_body),
            response_code: flag(|t| t.response_code),
            log_to_syslog: flag(|t| t.log_to_syslog),
            syslog_ip_address: text(|t| t.syslog_ip_address.as_ref()),
            syslog_protocol: text(|t| t.syslog_protocol.as_ref()),
            syslog_port: port(|t| t.syslog_port),
            log_to_cef: flag(|t| t.log_to_cef),
            cef_ip_address: text(|t| t.cef_ip_address.as_ref()),
            cef_protocol: text(|t| t.cef_protocol.as_ref()),
            cef_port: port(|t| t.cef_port),
        })
    }

    fn render(remote: RemoteLogTrigger) -> Result<LogTrigger> {
        Ok(LogTrigger {
            id: remote.id,
            name: remote.name,
            verbosity: non_empty(remote.verbosity).unwrap_or_else(default_verbosity),
            access_control_allow_events: remote.ac_allow,
            access_control_drop_events: remote.ac_drop,
            threat_prevention_detect_events: remote.tp_detect,
            threat_prevention_prevent_events: remote.tp_prevent,
            web_requests: remote.web_requests,
            web_url_path: remote.web_url_path,
            web_url_query: remote.web_url_query,
            web_headers: remote.web_headers,
            web_body: remote.web_body,
            log_to_cloud: remote.log_to_cloud,
            log_to_agent: remote.log_to_agent,
            extend_logging: remote.extend_logging,
            extend_logging_min_severity: non_empty(remote.extend_logging_min_severity),
            response_body: remote.response_body,
            response_code: remote.response_code,
            log_to_syslog: remote.log_to_syslog,
            syslog_ip_address: non_empty(remote.syslog_ip_address),
            syslog_protocol: non_empty(remote.syslog_protocol),
            syslog_port: non_zero(remote.syslog_port_num),
            log_to_cef: remote.log_to_cef,
            cef_ip_address: non_empty(remote.cef_ip_address),
            cef_protocol: non_empty(remote.cef_protocol),
            cef_port: non_zero(remote.cef_port_num),
        })
    }

    fn remote_id(remote: &RemoteLogTrigger) -> &str {
        &remote.id
    }

    fn observed_id(observed: &LogTrigger) -> &str {
        &observed.id
    }
}

macro_rules! log_trigger_fields {
    () => {
        "id name verbosity acAllow acDrop tpDetect tpPrevent webRequests webUrlPath webUrlQuery
        webHeaders webBody logToCloud logToAgent extendLogging extendLoggingMinSeverity
        responseBody responseCode logToSyslog syslogIpAddress syslogProtocol syslogPortNum
        logToCef cefIpAddress cefPortNum cefProtocol"
    };
}

impl GraphqlResource for LogTriggerResource {
    const CREATE: Document = Document {
        operation: "newLogTrigger",
        query: concat!(
            "mutation newLogTrigger($triggerInput: LogTriggerInput) ",
            "{ newLogTrigger(triggerInput: $triggerInput) { ",
            log_trigger_fields!(),
            " } }"
        ),
    };
    const FETCH: Document = Document {
        operation: "getLogTrigger",
        query: concat!(
            "query getLogTrigger($id: ID!) { getLogTrigger(id: $id) { ",
            log_trigger_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateLogTrigger",
        query: "mutation updateLogTrigger($triggerInput: LogTriggerInput, $id: ID!) { updateLogTrigger(triggerInput: $triggerInput, id: $id) }",
    };
    const DELETE: Document = Document {
        operation: "deleteTrigger",
        query: "mutation deleteTrigger($id: ID!) { deleteTrigger(id: $id) }",
    };
    const INPUT: &'static str = "triggerInput";
}
