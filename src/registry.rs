//! Resource kinds known to the CLI.
//!
//! Each kind is registered explicitly at startup. Handlers work on JSON
//! values so commands can treat every kind alike; the typed records only
//! exist inside a handler call.

use anyhow::{Context, Result};
use policy::{
    AppSecGatewayProfile, ExceptionsBehavior, GraphqlClient, GraphqlResource, LogTriggerResource,
    RateLimitPractice, Transport, TrustedSourcesBehavior, WebApiAsset, WebApiPracticeResource,
    WebApplicationAsset, WebApplicationPractice, WebUserResponse,
};
use reconcile::{ApplyResult, Mutation, Reconciled, Reconciler, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// Backend client used by every handler.
pub type Client<'a> = GraphqlClient<&'a dyn Transport>;

/// Result of a create or update, with the rendered observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub id: String,
    pub observed: Value,
    pub result: ApplyResult,
}

pub trait KindHandler {
    fn kind(&self) -> &'static str;

    /// Desired state as the engine understands it, with defaults filled in
    fn normalize(&self, desired: &Value) -> Result<Value>;

    fn create_payload(&self, desired: &Value) -> Result<Value>;

    /// `None` when nothing would be sent
    fn update_payload(&self, observed: &Value, desired: &Value) -> Result<Option<Value>>;

    fn create(&self, client: &Client<'_>, desired: &Value) -> Result<Outcome>;

    fn update(&self, client: &Client<'_>, observed: &Value, desired: &Value) -> Result<Outcome>;

    fn read(&self, client: &Client<'_>, id: &str) -> Result<Option<Value>>;

    fn delete(&self, client: &Client<'_>, id: &str) -> Result<ApplyResult>;
}

struct Handler<R>(PhantomData<fn() -> R>);

impl<R> Handler<R>
where
    R: GraphqlResource,
    R::Desired: DeserializeOwned,
    R::Observed: Serialize + DeserializeOwned,
{
    fn desired(value: &Value) -> Result<R::Desired> {
        serde_json::from_value(value.clone())
            .with_context(|| format!("Invalid {} declaration", R::KIND))
    }

    fn observed(value: &Value) -> Result<R::Observed> {
        serde_json::from_value(value.clone())
            .with_context(|| format!("Cached {} observation no longer matches its schema", R::KIND))
    }

    fn outcome(reconciled: Reconciled<R::Observed>) -> Result<Outcome> {
        Ok(Outcome {
            id: R::observed_id(&reconciled.observed).to_string(),
            observed: serde_json::to_value(&reconciled.observed)?,
            result: reconciled.result,
        })
    }
}

impl<R> KindHandler for Handler<R>
where
    R: GraphqlResource,
    R::Desired: Serialize + DeserializeOwned,
    R::Observed: Serialize + DeserializeOwned,
{
    fn kind(&self) -> &'static str {
        R::KIND
    }

    fn normalize(&self, desired: &Value) -> Result<Value> {
        Ok(serde_json::to_value(Self::desired(desired)?)?)
    }

    fn create_payload(&self, desired: &Value) -> Result<Value> {
        let input = R::create_input(&Self::desired(desired)?)?;
        Ok(serde_json::to_value(input)?)
    }

    fn update_payload(&self, observed: &Value, desired: &Value) -> Result<Option<Value>> {
        let input = R::update_input(&Self::observed(observed)?, &Self::desired(desired)?)?;
        if input.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_value(input)?))
    }

    fn create(&self, client: &Client<'_>, desired: &Value) -> Result<Outcome> {
        let desired = Self::desired(desired)?;
        let reconciled = Reconciler::new(client).create::<R>(&desired)?;
        Self::outcome(reconciled)
    }

    fn update(&self, client: &Client<'_>, observed: &Value, desired: &Value) -> Result<Outcome> {
        let observed = Self::observed(observed)?;
        let desired = Self::desired(desired)?;
        let reconciled = Reconciler::new(client).update::<R>(&observed, &desired)?;
        Self::outcome(reconciled)
    }

    fn read(&self, client: &Client<'_>, id: &str) -> Result<Option<Value>> {
        match Reconciler::new(client).read::<R>(id)? {
            Some(observed) => Ok(Some(serde_json::to_value(observed)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, client: &Client<'_>, id: &str) -> Result<ApplyResult> {
        Ok(Reconciler::new(client).delete::<R>(id)?)
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
pub struct Registry {
    handlers: Vec<Box<dyn KindHandler>>,
}

impl Registry {
    /// Every resource kind policyctl manages
    pub fn standard() -> Self {
        let mut registry = Self::default();
        registry.register::<WebApplicationAsset>();
        registry.register::<WebApiAsset>();
        registry.register::<AppSecGatewayProfile>();
        registry.register::<RateLimitPractice>();
        registry.register::<WebApplicationPractice>();
        registry.register::<WebApiPracticeResource>();
        registry.register::<LogTriggerResource>();
        registry.register::<TrustedSourcesBehavior>();
        registry.register::<ExceptionsBehavior>();
        registry.register::<WebUserResponse>();
        registry
    }

    pub fn register<R>(&mut self)
    where
        R: GraphqlResource + 'static,
        R::Desired: Serialize + DeserializeOwned,
        R::Observed: Serialize + DeserializeOwned,
    {
        if self.get(R::KIND).is_some() {
            log::warn!("Resource kind {} registered twice, keeping the first", R::KIND);
            return;
        }
        self.handlers.push(Box::new(Handler::<R>(PhantomData)));
    }

    pub fn get(&self, kind: &str) -> Option<&dyn KindHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.kind() == kind)
            .map(|handler| &**handler)
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|handler| handler.kind()).collect()
    }

    pub fn require(&self, kind: &str) -> Result<&dyn KindHandler> {
        self.get(kind).with_context(|| {
            format!(
                "Unknown resource kind {kind:?} (known kinds: {})",
                self.kinds().join(", ")
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_kinds() {
        let registry = Registry::standard();
        assert_eq!(
            registry.kinds(),
            vec![
                "web_application_asset",
                "web_api_asset",
                "appsec_gateway_profile",
                "rate_limit_practice",
                "web_application_practice",
                "web_api_practice",
                "log_trigger",
                "trusted_sources",
                "exceptions",
                "web_user_response",
            ]
        );
        assert!(registry.require("firewall_rule").is_err());
    }

    #[test]
    fn test_register_twice_keeps_one() {
        let mut registry = Registry::default();
        registry.register::<RateLimitPractice>();
        registry.register::<RateLimitPractice>();
        assert_eq!(registry.kinds(), vec!["rate_limit_practice"]);
    }

    #[test]
    fn test_update_payload_uses_cached_ids() {
        let registry = Registry::standard();
        let handler = registry.require("trusted_sources").unwrap();
        let observed = json!({
            "id": "ts-1",
            "name": "office",
            "visibility": "Shared",
            "sources_identifiers": ["10.0.0.0/8", "192.168.0.0/16"],
            "sources_identifiers_ids": ["10.0.0.0/8;;;s-1", "192.168.0.0/16;;;s-2"]
        });
        let desired = json!({"name": "office", "sources_identifiers": ["10.0.0.0/8"]});

        let payload = handler.update_payload(&observed, &desired).unwrap();

        assert_eq!(payload, Some(json!({"removeSourcesIdentifiers": ["s-2"]})));
        assert_eq!(handler.update_payload(&observed, &observed).unwrap(), None);
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let registry = Registry::standard();
        let handler = registry.require("rate_limit_practice").unwrap();

        let normalized = handler.normalize(&json!({"name": "login"})).unwrap();

        assert_eq!(normalized["visibility"], json!("Shared"));
        assert!(handler.normalize(&json!({"rules": []})).is_err());
    }
}
