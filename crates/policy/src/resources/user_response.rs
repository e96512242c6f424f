//! Web user-response behaviors.

use super::{changed, default_visibility};
use crate::backend::{Document, GraphqlResource};
use reconcile::{Mutation, Presence, ReferenceKind, Resource, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    /// `AlwaysAllow`, `AlwaysDeny`, `BlockPage`, `Redirect` or `ResponseCodeOnly`.
    pub mode: String,
    #[serde(default)]
    pub message_title: String,
    #[serde(default)]
    pub message_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response_code: Option<u32>,
    #[serde(default)]
    pub redirect_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_event_id: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponseCreateInput {
    pub name: String,
    pub visibility: String,
    pub mode: String,
    pub message_title: String,
    pub message_body: String,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub http_response_code: Presence<u32>,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub x_event_id: Presence<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponseUpdateInput {
    pub name: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_body: Option<String>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub http_response_code: Presence<u32>,
    #[serde(rename = "redirectURL", skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub x_event_id: Presence<bool>,
    /// Not sent; set when name or mode actually changed.
    #[serde(skip)]
    pub identity_changed: bool,
}

impl Mutation for UserResponseUpdateInput {
    // Name and mode ride along with every update, so they only count when
    // they changed. Declared response code and event flag are always sent
    // once something else forces an update.
    fn is_empty(&self) -> bool {
        !self.identity_changed
            && self.message_title.is_none()
            && self.message_body.is_none()
            && self.redirect_url.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUserResponse {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub visibility: Option<String>,
    pub mode: Option<String>,
    pub message_title: Option<String>,
    pub message_body: Option<String>,
    pub http_response_code: Option<u32>,
    #[serde(rename = "redirectURL")]
    pub redirect_url: Option<String>,
    pub x_event_id: Option<bool>,
}

pub struct WebUserResponse;

impl Resource for WebUserResponse {
    type Desired = UserResponse;
    type Observed = UserResponse;
    type Remote = RemoteUserResponse;
    type CreateInput = UserResponseCreateInput;
    type UpdateInput = UserResponseUpdateInput;

    const KIND: &'static str = "web_user_response";
    const REFERENCE: Option<ReferenceKind> = Some(ReferenceKind::Behavior);

    fn create_input(desired: &UserResponse) -> Result<UserResponseCreateInput> {
        Ok(UserResponseCreateInput {
            name: desired.name.clone(),
            visibility: desired.visibility.clone(),
            mode: desired.mode.clone(),
            message_title: desired.message_title.clone(),
            message_body: desired.message_body.clone(),
            http_response_code: Presence::of_declared(desired.http_response_code.as_ref()),
            redirect_url: desired.redirect_url.clone(),
            x_event_id: Presence::of_declared(desired.x_event_id.as_ref()),
        })
    }

    fn update_input(observed: &UserResponse, desired: &UserResponse) -> Result<UserResponseUpdateInput> {
        let declared_changed = desired.http_response_code.is_some_and(|code| observed.http_response_code != Some(code))
            || desired.x_event_id.is_some_and(|flag| observed.x_event_id != Some(flag));

        Ok(UserResponseUpdateInput {
            name: desired.name.clone(),
            mode: desired.mode.clone(),
            message_title: changed(&observed.message_title, &desired.message_title),
            message_body: changed(&observed.message_body, &desired.message_body),
            http_response_code: Presence::of_declared(desired.http_response_code.as_ref()),
            redirect_url: changed(&observed.redirect_url, &desired.redirect_url),
            x_event_id: Presence::of_declared(desired.x_event_id.as_ref()),
            identity_changed: observed.name != desired.name || observed.mode != desired.mode || declared_changed,
        })
    }

    fn render(remote: RemoteUserResponse) -> Result<UserResponse> {
        Ok(UserResponse {
            id: remote.id,
            name: remote.name,
            visibility: remote.visibility.unwrap_or_else(default_visibility),
            mode: remote.mode.unwrap_or_default(),
            message_title: remote.message_title.unwrap_or_default(),
            message_body: remote.message_body.unwrap_or_default(),
            http_response_code: remote.http_response_code.filter(|code| *code != 0),
            redirect_url: remote.redirect_url.unwrap_or_default(),
            x_event_id: remote.x_event_id,
        })
    }

    fn remote_id(remote: &RemoteUserResponse) -> &str {
        &remote.id
    }

    fn observed_id(observed: &UserResponse) -> &str {
        &observed.id
    }
}

macro_rules! user_response_fields {
    () => {
        "id name visibility mode messageTitle messageBody httpResponseCode redirectURL xEventId"
    };
}

impl GraphqlResource for WebUserResponse {
    const CREATE: Document = Document {
        operation: "newWebUserResponseBehavior",
        query: concat!(
            "mutation newWebUserResponseBehavior($behaviorInput: WebUserResponseBehaviorInput) ",
            "{ newWebUserResponseBehavior(behaviorInput: $behaviorInput) { ",
            user_response_fields!(),
            " } }"
        ),
    };
    const FETCH: Document = Document {
        operation: "getWebUserResponseBehavior",
        query: concat!(
            "query getWebUserResponseBehavior($id: ID!) { getWebUserResponseBehavior(id: $id) { ",
            user_response_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateWebUserResponseBehavior",
        query: "mutation updateWebUserResponseBehavior($behaviorInput: WebUserResponseBehaviorUpdateInput, $id: ID!) { updateWebUserResponseBehavior(behaviorInput: $behaviorInput, id: $id) }",
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

    fn observed() -> UserResponse {
        WebUserResponse::render(
            serde_json::from_value(json!({
                "id": "ur-1",
                "name": "blocked",
                "visibility": "Shared",
                "mode": "BlockPage",
                "messageTitle": "Blocked",
                "messageBody": "Request blocked",
                "httpResponseCode": 403,
                "redirectURL": "",
                "xEventId": true
            }))
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_identical_declaration_is_empty() {
        let current = observed();
        let input = WebUserResponse::update_input(&current, &current).unwrap();
        assert!(input.is_empty());
    }

    #[test]
    fn test_declared_fields_ride_along() {
        let current = observed();
        let mut desired = current.clone();
        desired.message_title = "Denied".to_string();

        let input = WebUserResponse::update_input(&current, &desired).unwrap();

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "name": "blocked",
                "mode": "BlockPage",
                "messageTitle": "Denied",
                "httpResponseCode": 403,
                "xEventId": true
            })
        );
    }

    #[test]
    fn test_event_flag_change_forces_update() {
        let current = observed();
        let mut desired = current.clone();
        desired.x_event_id = Some(false);

        let input = WebUserResponse::update_input(&current, &desired).unwrap();

        assert!(!input.is_empty());
        assert_eq!(serde_json::to_value(&input).unwrap()["xEventId"], json!(false));
    }
}
