//! Trusted-sources behaviors.

use super::{changed, default_visibility};
use crate::backend::{Document, GraphqlResource};
use reconcile::codec::{self, Separator};
use reconcile::{Mutation, Presence, ReferenceKind, Resource, Result, diff_values};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedSources {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    /// Minimum number of sources that must agree before a request is trusted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_num_of_sources: Option<i64>,
    #[serde(default)]
    pub sources_identifiers: Vec<String>,
    /// `source;;;id` for every observed source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources_identifiers_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedSourcesCreateInput {
    pub name: String,
    pub visibility: String,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub num_of_sources: Presence<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources_identifiers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedSourcesUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub num_of_sources: Presence<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_sources_identifiers: Vec<String>,
    /// Source IDs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_sources_identifiers: Vec<String>,
}

impl Mutation for TrustedSourcesUpdateInput {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.visibility.is_none()
            && self.num_of_sources.is_absent()
            && self.add_sources_identifiers.is_empty()
            && self.remove_sources_identifiers.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSource {
    pub id: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrustedSources {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub visibility: Option<String>,
    pub num_of_sources: Option<i64>,
    pub sources_identifiers: Option<Vec<RemoteSource>>,
}

pub struct TrustedSourcesBehavior;

impl Resource for TrustedSourcesBehavior {
    type Desired = TrustedSources;
    type Observed = TrustedSources;
    type Remote = RemoteTrustedSources;
    type CreateInput = TrustedSourcesCreateInput;
    type UpdateInput = TrustedSourcesUpdateInput;

    const KIND: &'static str = "trusted_sources";
    const REFERENCE: Option<ReferenceKind> = Some(ReferenceKind::Behavior);

    fn create_input(desired: &TrustedSources) -> Result<TrustedSourcesCreateInput> {
        Ok(TrustedSourcesCreateInput {
            name: desired.name.clone(),
            visibility: desired.visibility.clone(),
            num_of_sources: Presence::of_declared(desired.min_num_of_sources.as_ref()),
            sources_identifiers: desired.sources_identifiers.clone(),
        })
    }

    fn update_input(observed: &TrustedSources, desired: &TrustedSources) -> Result<TrustedSourcesUpdateInput> {
        let sources = diff_values(&observed.sources_identifiers, &desired.sources_identifiers);
        let ids = codec::index_ids(&observed.sources_identifiers_ids, Separator::Value)?;

        Ok(TrustedSourcesUpdateInput {
            name: changed(&observed.name, &desired.name),
            visibility: changed(&observed.visibility, &desired.visibility),
            num_of_sources: Presence::of_change(
                observed.min_num_of_sources.as_ref(),
                desired.min_num_of_sources.as_ref(),
            ),
            remove_sources_identifiers: codec::resolve_ids(&sources.removed, &ids, Separator::Value)?,
            add_sources_identifiers: sources.added,
        })
    }

    fn render(remote: RemoteTrustedSources) -> Result<TrustedSources> {
        let sources = remote.sources_identifiers.unwrap_or_default();
        Ok(TrustedSources {
            id: remote.id,
            name: remote.name,
            visibility: remote.visibility.unwrap_or_else(default_visibility),
            min_num_of_sources: remote.num_of_sources,
            sources_identifiers_ids: sources
                .iter()
                .map(|s| codec::encode(&s.source, &s.id, Separator::Value))
                .collect(),
            sources_identifiers: sources.into_iter().map(|s| s.source).collect(),
        })
    }

    fn remote_id(remote: &RemoteTrustedSources) -> &str {
        &remote.id
    }

    fn observed_id(observed: &TrustedSources) -> &str {
        &observed.id
    }
}

macro_rules! trusted_sources_fields {
    () => {
        "id name visibility numOfSources sourcesIdentifiers { id source }"
    };
}

impl GraphqlResource for TrustedSourcesBehavior {
    const CREATE: Document = Document {
        operation: "newTrustedSourceBehavior",
        query: concat!(
            "mutation newTrustedSourceBehavior($behaviorInput: TrustedSourceBehaviorInput) ",
            "{ newTrustedSourceBehavior(behaviorInput: $behaviorInput) { ",
            trusted_sources_fields!(),
            " } }"
        ),
    };
    const FETCH: Document = Document {
        operation: "getTrustedSourceBehavior",
        query: concat!(
            "query getTrustedSourceBehavior($id: ID!) { getTrustedSourceBehavior(id: $id) { ",
            trusted_sources_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateTrustedSourceBehavior",
        query: "mutation updateTrustedSourceBehavior($behaviorInput: TrustedSourceBehaviorUpdateInput, $id: ID!) { updateTrustedSourceBehavior(behaviorInput: $behaviorInput, id: $id) }",
    };
    const DELETE: Document = Document {
        operation: "deleteBehavior",
        query: "mutation deleteBehavior($id: ID!) { deleteBehavior(id: $id) }",
    };
    const INPUT: &'static str = "behaviorInput";
}
