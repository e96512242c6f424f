//! # Policy
//!
//! Managed security-policy objects and the GraphQL backend that stores them.
//!
//! Each resource kind is a marker type implementing [`reconcile::Resource`]
//! (how declared state maps onto backend payloads) and
//! [`backend::GraphqlResource`] (which documents carry those payloads).
//! [`backend::GraphqlClient`] drives any [`backend::Transport`], usually
//! [`backend::HttpTransport`].
//!
//! ## Example
//!
//! ```ignore
//! use policy::backend::{GraphqlClient, HttpTransport};
//! use policy::resources::rate_limit::RateLimitPractice;
//! use reconcile::Reconciler;
//!
//! let client = GraphqlClient::new(HttpTransport::new(endpoint, token, timeout));
//! let mut reconciler = Reconciler::new(&client);
//! let created = reconciler.create::<RateLimitPractice>(&desired)?;
//! ```

pub mod backend;
pub mod resources;

pub use backend::{Document, GraphqlClient, GraphqlResource, HttpTransport, Transport};
pub use resources::DEFAULT_VISIBILITY;
pub use resources::exceptions::{ExceptionBehavior, ExceptionsBehavior};
pub use resources::gateway_profile::{AppSecGatewayProfile, GatewayProfile};
pub use resources::log_trigger::{LogTrigger, LogTriggerResource};
pub use resources::rate_limit::{RateLimit, RateLimitPractice};
pub use resources::trusted_sources::{TrustedSources, TrustedSourcesBehavior};
pub use resources::user_response::{UserResponse, WebUserResponse};
pub use resources::web_api_practice::{WebApiPractice, WebApiPracticeResource};
pub use resources::web_asset::{WebApiAsset, WebApplicationAsset, WebAsset};
pub use resources::web_practice::{WebApplicationPractice, WebPractice};
