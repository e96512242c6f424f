//! GraphQL backend.
//!
//! [`GraphqlClient`] implements the reconcile provider traits for every
//! resource kind on top of a [`Transport`] that executes one GraphQL
//! document and returns the operation's result.

pub mod http;
#[cfg(test)]
pub mod memory;

pub use http::HttpTransport;

use crate::resources::web_asset::{AssetUpdateInput, RemoteAsset, WebApiAsset, WebApplicationAsset};
use reconcile::{
    Backend, Error, Mutation, ReferenceKind, Referrer, References, Resource, Result, Transaction,
};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// One GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Document {
    /// Operation name, also the key of its result under `data`.
    pub operation: &'static str,
    pub query: &'static str,
}

/// Executes GraphQL documents.
pub trait Transport {
    /// Run `document` and return `data[operation]`, which may be `null`.
    fn execute(&self, document: &Document, variables: Value) -> Result<Value>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, document: &Document, variables: Value) -> Result<Value> {
        (**self).execute(document, variables)
    }
}

/// A resource kind with its GraphQL documents.
pub trait GraphqlResource: Resource<Remote: DeserializeOwned> {
    const CREATE: Document;
    const FETCH: Document;
    const UPDATE: Document;
    const DELETE: Document;
    /// Name of the input variable in `CREATE` and `UPDATE`.
    const INPUT: &'static str;
}

pub const DISCARD: Document = Document {
    operation: "discardChanges",
    query: "mutation discardChanges { discardChanges }",
};

pub const PRACTICE_USED_BY: Document = Document {
    operation: "practiceUsedBy",
    query: "query practiceUsedBy($id: ID!) { practiceUsedBy(id: $id) { id name type subType objectStatus } }",
};

pub const BEHAVIOR_USED_BY: Document = Document {
    operation: "behaviorUsedBy",
    query: "query behaviorUsedBy($id: ID!) { behaviorUsedBy(id: $id) { id name type subType objectStatus } }",
};

/// Profiles report their referrers on the profile object itself.
pub const PROFILE_USED_BY: Document = Document {
    operation: "getCloudGuardAppSecGatewayProfile",
    query: "query getCloudGuardAppSecGatewayProfile($id: ID!) { getCloudGuardAppSecGatewayProfile(id: $id) { id usedBy { id name type subType objectStatus } } }",
};

/// Answers `[{container, practices}]`: the asset and the practices whose
/// wrappers carry the trigger.
pub const TRIGGER_USED_BY: Document = Document {
    operation: "usedByTrigger",
    query: "query usedByTrigger($id: ID!) { usedByTrigger(id: $id) }",
};

#[derive(Debug, Deserialize)]
struct UsedByHolder {
    #[serde(rename = "usedBy", default)]
    used_by: Option<Vec<Referrer>>,
}

#[derive(Debug, Deserialize)]
struct TriggerUse {
    container: String,
    #[serde(default)]
    practices: Vec<String>,
}

impl From<TriggerUse> for Referrer {
    fn from(usage: TriggerUse) -> Self {
        Self {
            name: usage.container.clone(),
            id: usage.container,
            object_type: "Asset".to_string(),
            sub_type: String::new(),
            status: String::new(),
            practices: usage.practices,
        }
    }
}

fn id_variables(id: &str) -> Value {
    let mut variables = Map::new();
    variables.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(variables)
}

fn with_input<I: Serialize>(name: &str, input: &I, id: Option<&str>) -> Result<Value> {
    let mut variables = Map::new();
    variables.insert(name.to_string(), serde_json::to_value(input)?);
    if let Some(id) = id {
        variables.insert("id".to_string(), Value::String(id.to_string()));
    }
    Ok(Value::Object(variables))
}

// ============================================================================
// Client
// ============================================================================

/// Backend client over a GraphQL transport.
pub struct GraphqlClient<T> {
    transport: T,
}

impl<T: Transport> GraphqlClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call(&self, document: &Document, variables: Value) -> Result<Value> {
        log::debug!("GraphQL {}", document.operation);
        self.transport.execute(document, variables)
    }

    fn call_bool(&self, document: &Document, variables: Value) -> Result<bool> {
        match self.call(document, variables)? {
            Value::Bool(accepted) => Ok(accepted),
            other => Err(Error::Protocol(format!(
                "{} returned {other}, expected a boolean",
                document.operation
            ))),
        }
    }
}

impl<T: Transport> Transaction for GraphqlClient<T> {
    fn publish(&self) -> Result<bool> {
        // Changes made through this API are applied when the mutation returns.
        log::debug!("Publishing staged changes");
        Ok(true)
    }

    fn discard(&self) -> Result<bool> {
        log::debug!("Discarding staged changes");
        self.call_bool(&DISCARD, Value::Null)
    }
}

impl<T: Transport, R: GraphqlResource> Backend<R> for GraphqlClient<T> {
    fn create(&self, input: &R::CreateInput) -> Result<R::Remote> {
        let variables = with_input(R::INPUT, input, None)?;
        match self.call(&R::CREATE, variables)? {
            Value::Null => Err(Error::Protocol(format!("{} returned no object", R::CREATE.operation))),
            value => Ok(serde_json::from_value(value)?),
        }
    }

    fn fetch(&self, id: &str) -> Result<Option<R::Remote>> {
        match self.call(&R::FETCH, id_variables(id))? {
            Value::Null => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    fn update(&self, id: &str, input: &R::UpdateInput) -> Result<bool> {
        let variables = with_input(R::INPUT, input, Some(id))?;
        self.call_bool(&R::UPDATE, variables)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.call_bool(&R::DELETE, id_variables(id))
    }
}

impl<T: Transport> GraphqlClient<T> {
    /// Find the asset behind a trigger referrer, trying web APIs first.
    fn trigger_container(&self, id: &str) -> Result<(bool, RemoteAsset)> {
        match <Self as Backend<WebApiAsset>>::fetch(self, id) {
            Ok(Some(asset)) => return Ok((true, asset)),
            Ok(None) => {}
            Err(err) => log::debug!("{id} is not a web API asset: {err}"),
        }
        <Self as Backend<WebApplicationAsset>>::fetch(self, id)?
            .map(|asset| (false, asset))
            .ok_or_else(|| Error::NotFound {
                kind: "web asset",
                id: id.to_string(),
            })
    }

    fn strip_trigger(&self, referrer: &Referrer, id: &str) -> Result<bool> {
        let (is_api, remote) = self.trigger_container(&referrer.id)?;
        let asset = WebApplicationAsset::render(remote)?;
        let input = AssetUpdateInput::without_trigger(&asset, &referrer.practices, id);
        if input.is_empty() {
            log::debug!("{} no longer carries trigger {id}", referrer.id);
            return Ok(true);
        }
        if is_api {
            <Self as Backend<WebApiAsset>>::update(self, &referrer.id, &input)
        } else {
            <Self as Backend<WebApplicationAsset>>::update(self, &referrer.id, &input)
        }
    }
}

impl<T: Transport> References for GraphqlClient<T> {
    fn used_by(&self, kind: ReferenceKind, id: &str) -> Result<Vec<Referrer>> {
        let document = match kind {
            ReferenceKind::Practice => &PRACTICE_USED_BY,
            ReferenceKind::Behavior => &BEHAVIOR_USED_BY,
            ReferenceKind::Profile => &PROFILE_USED_BY,
            ReferenceKind::Trigger => &TRIGGER_USED_BY,
        };
        let value = self.call(document, id_variables(id))?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        match kind {
            ReferenceKind::Practice | ReferenceKind::Behavior => Ok(serde_json::from_value(value)?),
            ReferenceKind::Profile => {
                let holder: UsedByHolder = serde_json::from_value(value)?;
                Ok(holder.used_by.unwrap_or_default())
            }
            ReferenceKind::Trigger => {
                let uses: Vec<TriggerUse> = serde_json::from_value(value)?;
                Ok(uses.into_iter().map(Referrer::from).collect())
            }
        }
    }

    fn strip_reference(&self, referrer: &Referrer, kind: ReferenceKind, id: &str) -> Result<bool> {
        if kind == ReferenceKind::Trigger {
            return self.strip_trigger(referrer, id);
        }
        let input = AssetUpdateInput::detach(kind, id);
        match referrer.sub_type.as_str() {
            "WebApplication" | "WebApp" => {
                <Self as Backend<WebApplicationAsset>>::update(self, &referrer.id, &input)
            }
            "WebAPI" => <Self as Backend<WebApiAsset>>::update(self, &referrer.id, &input),
            other => Err(Error::UnsupportedReferrer {
                object_type: referrer.object_type.clone(),
                sub_type: other.to_string(),
                id: referrer.id.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryTransport;
    use super::*;
    use crate::resources::rate_limit::RateLimitPractice;
    use serde_json::json;

    #[test]
    fn test_fetch_null_is_none() {
        let transport = MemoryTransport::default();
        transport.respond("getRateLimitPractice", Value::Null);
        let client = GraphqlClient::new(&transport);

        let fetched = <GraphqlClient<_> as Backend<RateLimitPractice>>::fetch(&client, "rl-1").unwrap();

        assert!(fetched.is_none());
        assert_eq!(transport.calls_to("getRateLimitPractice"), vec![json!({"id": "rl-1"})]);
    }

    #[test]
    fn test_update_requires_boolean() {
        let transport = MemoryTransport::default();
        transport.respond("updateRateLimitPractice", json!("yes"));
        let client = GraphqlClient::new(&transport);

        let err = <GraphqlClient<_> as Backend<RateLimitPractice>>::update(
            &client,
            "rl-1",
            &Default::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_discard_calls_backend_and_publish_does_not() {
        let transport = MemoryTransport::default();
        transport.respond("discardChanges", json!(true));
        let client = GraphqlClient::new(&transport);

        assert!(client.publish().unwrap());
        assert!(client.discard().unwrap());
        assert_eq!(transport.count("discardChanges"), 1);
        assert_eq!(transport.total(), 1);
    }

    #[test]
    fn test_used_by_selects_document() {
        let transport = MemoryTransport::default();
        transport.respond(
            "behaviorUsedBy",
            json!([{"id": "a-1", "name": "shop", "type": "Asset", "subType": "WebAPI", "objectStatus": "Active"}]),
        );
        transport.respond("practiceUsedBy", Value::Null);
        let client = GraphqlClient::new(&transport);

        let referrers = client.used_by(ReferenceKind::Behavior, "b-1").unwrap();
        assert_eq!(referrers.len(), 1);
        assert_eq!(referrers[0].sub_type, "WebAPI");
        assert!(client.used_by(ReferenceKind::Practice, "p-1").unwrap().is_empty());
    }

    #[test]
    fn test_strip_reference_routes_by_sub_type() {
        let transport = MemoryTransport::default();
        transport.respond("updateWebAPIAsset", json!(true));
        let client = GraphqlClient::new(&transport);
        let referrer = Referrer {
            id: "a-1".to_string(),
            name: "api".to_string(),
            object_type: "Asset".to_string(),
            sub_type: "WebAPI".to_string(),
            status: "Active".to_string(),
            practices: Vec::new(),
        };

        assert!(client.strip_reference(&referrer, ReferenceKind::Behavior, "b-1").unwrap());
        assert_eq!(
            transport.calls_to("updateWebAPIAsset"),
            vec![json!({"assetInput": {"removeBehaviors": ["b-1"]}, "id": "a-1"})]
        );

        let unknown = Referrer {
            sub_type: "Kubernetes".to_string(),
            ..referrer
        };
        let err = client
            .strip_reference(&unknown, ReferenceKind::Behavior, "b-1")
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedReferrer { ref sub_type, .. } if sub_type == "Kubernetes"));
        assert_eq!(transport.total(), 1);
    }

    #[test]
    fn test_profile_referrers_come_from_profile() {
        let transport = MemoryTransport::default();
        transport.respond(
            "getCloudGuardAppSecGatewayProfile",
            json!({
                "id": "gw-1",
                "usedBy": [{"id": "a-1", "name": "shop", "type": "Asset", "subType": "WebApplication", "objectStatus": "Active"}]
            }),
        );
        let client = GraphqlClient::new(&transport);

        let referrers = client.used_by(ReferenceKind::Profile, "gw-1").unwrap();

        assert_eq!(referrers.len(), 1);
        assert_eq!(referrers[0].id, "a-1");
        assert_eq!(
            transport.calls_to("getCloudGuardAppSecGatewayProfile"),
            vec![json!({"id": "gw-1"})]
        );
    }

    #[test]
    fn test_trigger_referrers_carry_practices() {
        let transport = MemoryTransport::default();
        transport.respond("usedByTrigger", json!([{"container": "a-1", "practices": ["p-1"]}]));
        let client = GraphqlClient::new(&transport);

        let referrers = client.used_by(ReferenceKind::Trigger, "t-1").unwrap();

        assert_eq!(referrers.len(), 1);
        assert_eq!(referrers[0].id, "a-1");
        assert_eq!(referrers[0].practices, vec!["p-1"]);
        assert!(referrers[0].is_live());
    }
}
