//! HTTP transport for the GraphQL endpoint.

use super::{Document, Transport};
use reconcile::{DependencyBlocker, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Posts GraphQL documents with a bearer token.
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: String,
    token: String,
}

impl HttpTransport {
    /// Create a transport. `timeout` bounds each request end to end.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct Request<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    extensions: Option<Extensions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Extensions {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    reference_id: Option<String>,
    #[serde(default)]
    message_params: Option<MessageParams>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageParams {
    #[serde(default)]
    profile_id: Option<String>,
    #[serde(default)]
    practice_id: Option<String>,
    #[serde(default)]
    behavior_id: Option<String>,
}

fn http_error(err: ureq::Error) -> Error {
    match err {
        ureq::Error::StatusCode(code) => Error::transport(format!("HTTP {code}"), Some(code)),
        other => Error::transport(other.to_string(), None),
    }
}

/// Turn the first GraphQL error into a typed error.
fn classify(error: GraphqlError) -> Error {
    let extensions = error.extensions.unwrap_or_default();
    if let Some(params) = extensions.message_params {
        let blocker = params
            .profile_id
            .map(DependencyBlocker::Profile)
            .or_else(|| params.practice_id.map(DependencyBlocker::Practice))
            .or_else(|| params.behavior_id.map(DependencyBlocker::Behavior));
        if let Some(blocker) = blocker {
            return Error::Dependency {
                message: error.message,
                blocker,
            };
        }
    }

    if let Some(code) = &extensions.code {
        log::debug!("GraphQL error code {code}");
    }
    match extensions.reference_id {
        Some(reference) => Error::from_backend_message(format!("{} (reference id {reference})", error.message)),
        None => Error::from_backend_message(error.message),
    }
}

/// Pull `data[operation]` out of a response.
fn extract(operation: &str, status: u16, envelope: Envelope) -> Result<Value> {
    if let Some(error) = envelope.errors.into_iter().next() {
        return Err(classify(error));
    }
    if !(200..300).contains(&status) {
        return Err(Error::transport(format!("HTTP {status}"), Some(status)));
    }

    match envelope.data {
        Some(Value::Object(mut data)) => data
            .remove(operation)
            .ok_or_else(|| Error::Protocol(format!("response has no {operation} field"))),
        Some(other) => Err(Error::Protocol(format!("response data is {other}, expected an object"))),
        None => Err(Error::Protocol("response has no data".to_string())),
    }
}

impl Transport for HttpTransport {
    fn execute(&self, document: &Document, variables: Value) -> Result<Value> {
        let request = Request {
            query: document.query,
            variables,
        };

        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .send_json(&request)
            .map_err(http_error)?;

        let status = response.status().as_u16();
        let envelope: Envelope = match response.body_mut().read_json() {
            Ok(envelope) => envelope,
            Err(_) if !(200..300).contains(&status) => {
                return Err(Error::transport(format!("HTTP {status}"), Some(status)));
            }
            Err(err) => return Err(http_error(err)),
        };

        log::trace!("{} answered with HTTP {status}", document.operation);
        extract(document.operation, status, envelope)
    }
}
