//! Web application and web API assets.
//!
//! Both kinds share one model; they differ only in their GraphQL documents.
//! Assets are the objects that point at practices and behaviors, so they
//! also provide the update used to detach a reference before a delete.

use super::{ObjectRef, changed, ids, null_default};
use crate::backend::{Document, GraphqlResource};
use reconcile::codec::{self, Separator};
use reconcile::flatten::{creation_settings, reconcile_settings, unflatten};
use reconcile::settings::{SettingInput, SettingUpdate};
use reconcile::{
    DependencyBlocker, FlattenedSetting, Mutation, Presence, ReferenceKind, Resource, Result,
    VirtualSettings, diff, diff_values, keyed_diff,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Declared / Observed State
// ============================================================================

/// A practice attached to an asset, with its modes and triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeWrapper {
    /// Practice ID.
    pub id: String,
    pub main_mode: String,
    /// Sub-practice name to mode.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_practices_modes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
}

impl PracticeWrapper {
    /// Whole-record signature; any change makes it a different wrapper.
    fn signature(&self) -> String {
        let mut triggers = self.triggers.clone();
        triggers.sort();
        let modes: Vec<String> = self
            .sub_practices_modes
            .iter()
            .map(|(sub, mode)| format!("{sub}={mode}"))
            .collect();
        format!("{}|{}|{}|{}", self.id, self.main_mode, modes.join(","), triggers.join(","))
    }

    /// The backend rejects wrappers with an empty practice or mode.
    fn is_complete(&self) -> bool {
        !self.id.is_empty()
            && !self.main_mode.is_empty()
            && self.sub_practices_modes.values().all(|mode| !mode.is_empty())
    }

    fn to_input(&self) -> PracticeWrapperInput {
        PracticeWrapperInput {
            practice_id: self.id.clone(),
            main_mode: self.main_mode.clone(),
            sub_practice_modes: self
                .sub_practices_modes
                .iter()
                .map(|(sub_practice, mode)| PracticeModeInput {
                    mode: mode.clone(),
                    sub_practice: sub_practice.clone(),
                })
                .collect(),
            triggers: self.triggers.clone(),
        }
    }
}

/// A request attribute that identifies the source of traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentifier {
    pub identifier: String,
    #[serde(default)]
    pub values: Vec<String>,
    /// `value;;;id` for every observed value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl SourceIdentifier {
    fn same_values(&self, other: &Self) -> bool {
        let mut left = self.values.clone();
        let mut right = other.values.clone();
        left.sort();
        right.sort();
        left == right
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl Tag {
    fn signature(&self) -> String {
        format!("{}:{}", self.key, self.value)
    }

    fn is_complete(&self) -> bool {
        !self.key.is_empty() && !self.value.is_empty()
    }
}

/// A web asset, as declared in the manifest or as last observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAsset {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_shares_urls: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub behaviors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// `url;;;;id` for every observed URL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub practices: Vec<PracticeWrapper>,
    /// Plain proxy settings. Virtual keys are not allowed here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxy_settings: Vec<FlattenedSetting>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_identifiers: Vec<SourceIdentifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(flatten)]
    pub virtual_settings: VirtualSettings,
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeModeInput {
    pub mode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sub_practice: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeWrapperInput {
    pub practice_id: String,
    pub main_mode: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_practice_modes: Vec<PracticeModeInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceIdentifierInput {
    pub source_identifier: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceIdentifierUpdate {
    pub id: String,
    pub source_identifier: String,
    pub add_values: Vec<String>,
    pub remove_values: Vec<String>,
    pub update_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagInput {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCreateInput {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub practices: Vec<PracticeWrapperInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub behaviors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagInput>,
    #[serde(rename = "proxySetting", skip_serializing_if = "Vec::is_empty")]
    pub proxy_settings: Vec<SettingInput>,
    #[serde(rename = "upstreamURL", skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    #[serde(rename = "URLs", skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_identifiers: Vec<SourceIdentifierInput>,
    #[serde(rename = "isSharesURLs", skip_serializing_if = "Option::is_none")]
    pub is_shares_urls: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub state: Presence<String>,
    #[serde(rename = "upstreamURL", skip_serializing_if = "Presence::is_absent")]
    pub upstream_url: Presence<String>,
    #[serde(rename = "isSharesURLs", skip_serializing_if = "Presence::is_absent")]
    pub is_shares_urls: Presence<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_practices: Vec<PracticeWrapperInput>,
    /// Practice IDs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_practices: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_profiles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_profiles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_behaviors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_behaviors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_proxy_setting: Vec<SettingInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_proxy_setting: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_proxy_setting: Vec<SettingUpdate>,
    #[serde(rename = "addURLs", skip_serializing_if = "Vec::is_empty")]
    pub add_urls: Vec<String>,
    #[serde(rename = "removeURLs", skip_serializing_if = "Vec::is_empty")]
    pub remove_urls: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_source_identifiers: Vec<SourceIdentifierInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_source_identifiers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_source_identifiers: Vec<SourceIdentifierUpdate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_tags: Vec<TagInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_tags: Vec<String>,
}

impl AssetUpdateInput {
    /// Payload that drops one practice, behavior or profile reference from
    /// an asset.
    ///
    /// Triggers sit inside practice wrappers and need the asset itself; see
    /// [`AssetUpdateInput::without_trigger`]. For them this payload is empty.
    pub fn detach(kind: ReferenceKind, id: &str) -> Self {
        let mut input = Self::default();
        match kind {
            ReferenceKind::Practice => input.remove_practices.push(id.to_string()),
            ReferenceKind::Behavior => input.remove_behaviors.push(id.to_string()),
            ReferenceKind::Profile => input.remove_profiles.push(id.to_string()),
            ReferenceKind::Trigger => {}
        }
        input
    }

    /// Payload that re-attaches the wrappers of `practices` without `trigger`.
    ///
    /// Wrappers cannot be edited in place, so each affected one is removed
    /// and added again, the same way a changed wrapper is updated.
    pub fn without_trigger(asset: &WebAsset, practices: &[String], trigger: &str) -> Self {
        let mut input = Self::default();
        for wrapper in &asset.practices {
            if !practices.contains(&wrapper.id) || !wrapper.triggers.iter().any(|t| t == trigger) {
                continue;
            }
            let mut kept = wrapper.clone();
            kept.triggers.retain(|t| t != trigger);
            input.remove_practices.push(wrapper.id.clone());
            input.add_practices.push(kept.to_input());
        }
        input
    }
}

impl Mutation for AssetUpdateInput {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.state.is_absent()
            && self.upstream_url.is_absent()
            && self.is_shares_urls.is_absent()
            && self.add_practices.is_empty()
            && self.remove_practices.is_empty()
            && self.add_profiles.is_empty()
            && self.remove_profiles.is_empty()
            && self.add_behaviors.is_empty()
            && self.remove_behaviors.is_empty()
            && self.add_proxy_setting.is_empty()
            && self.remove_proxy_setting.is_empty()
            && self.update_proxy_setting.is_empty()
            && self.add_urls.is_empty()
            && self.remove_urls.is_empty()
            && self.add_source_identifiers.is_empty()
            && self.remove_source_identifiers.is_empty()
            && self.update_source_identifiers.is_empty()
            && self.add_tags.is_empty()
            && self.remove_tags.is_empty()
    }
}

// ============================================================================
// Backend Objects
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePracticeMode {
    #[serde(default, deserialize_with = "null_default")]
    pub mode: String,
    #[serde(default, deserialize_with = "null_default")]
    pub sub_practice: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePracticeWrapper {
    #[serde(default, deserialize_with = "null_default")]
    pub main_mode: String,
    #[serde(default, deserialize_with = "null_default")]
    pub sub_practice_modes: Vec<RemotePracticeMode>,
    #[serde(default, deserialize_with = "null_default")]
    pub practice: ObjectRef,
    #[serde(default, deserialize_with = "null_default")]
    pub triggers: Vec<ObjectRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteIdentifierValue {
    pub id: String,
    #[serde(rename = "IdentifierValue")]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSourceIdentifier {
    pub id: String,
    pub source_identifier: String,
    #[serde(default, deserialize_with = "null_default")]
    pub values: Vec<RemoteIdentifierValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteUrl {
    pub id: String,
    #[serde(rename = "URL")]
    pub url: String,
}

/// An asset as returned by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAsset {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub state: String,
    #[serde(rename = "upstreamURL", default, deserialize_with = "null_default")]
    pub upstream_url: String,
    #[serde(default, deserialize_with = "null_default")]
    pub practices: Vec<RemotePracticeWrapper>,
    #[serde(default, deserialize_with = "null_default")]
    pub profiles: Vec<ObjectRef>,
    #[serde(default, deserialize_with = "null_default")]
    pub behaviors: Vec<ObjectRef>,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<Tag>,
    #[serde(default, deserialize_with = "null_default")]
    pub source_identifiers: Vec<RemoteSourceIdentifier>,
    #[serde(rename = "proxySetting", default, deserialize_with = "null_default")]
    pub proxy_settings: Vec<FlattenedSetting>,
    #[serde(rename = "URLs", default, deserialize_with = "null_default")]
    pub urls: Vec<RemoteUrl>,
    #[serde(rename = "isSharesURLs", default, deserialize_with = "null_default")]
    pub is_shares_urls: bool,
}

// ============================================================================
// Conversions
// ============================================================================

fn create_input(desired: &WebAsset) -> Result<AssetCreateInput> {
    Ok(AssetCreateInput {
        name: desired.name.clone(),
        practices: desired
            .practices
            .iter()
            .filter(|wrapper| wrapper.is_complete())
            .map(PracticeWrapper::to_input)
            .collect(),
        profiles: desired.profiles.clone(),
        behaviors: desired.behaviors.clone(),
        tags: desired
            .tags
            .iter()
            .filter(|tag| tag.is_complete())
            .map(|tag| TagInput {
                key: tag.key.clone(),
                value: tag.value.clone(),
            })
            .collect(),
        proxy_settings: creation_settings(&desired.proxy_settings, &desired.virtual_settings)?,
        upstream_url: desired.upstream_url.clone(),
        urls: desired.urls.clone(),
        source_identifiers: desired
            .source_identifiers
            .iter()
            .map(|identifier| SourceIdentifierInput {
                source_identifier: identifier.identifier.clone(),
                values: identifier.values.clone(),
            })
            .collect(),
        is_shares_urls: desired.is_shares_urls,
    })
}

fn update_source_identifiers(
    old: &[SourceIdentifier],
    new: &[SourceIdentifier],
    input: &mut AssetUpdateInput,
) -> Result<()> {
    let delta = keyed_diff(
        old,
        new,
        |identifier| identifier.identifier.clone(),
        |a, b| !a.same_values(b),
    );

    for identifier in delta.added {
        input.add_source_identifiers.push(SourceIdentifierInput {
            source_identifier: identifier.identifier,
            values: identifier.values,
        });
    }
    for identifier in delta.removed {
        input.remove_source_identifiers.push(identifier.id);
    }
    for (before, after) in delta.updated {
        let values = diff_values(&before.values, &after.values);
        let index = codec::index_ids(&before.values_ids, Separator::Value)?;
        input.update_source_identifiers.push(SourceIdentifierUpdate {
            id: before.id,
            source_identifier: before.identifier,
            add_values: values.added,
            remove_values: codec::resolve_ids(&values.removed, &index, Separator::Value)?,
            update_values: Vec::new(),
        });
    }
    Ok(())
}

fn update_input(observed: &WebAsset, desired: &WebAsset) -> Result<AssetUpdateInput> {
    let mut input = AssetUpdateInput {
        name: changed(&observed.name, &desired.name),
        state: Presence::of_change(observed.state.as_ref(), desired.state.as_ref()),
        upstream_url: Presence::of_change(observed.upstream_url.as_ref(), desired.upstream_url.as_ref()),
        is_shares_urls: Presence::of_change(observed.is_shares_urls.as_ref(), desired.is_shares_urls.as_ref()),
        ..AssetUpdateInput::default()
    };

    let profiles = diff_values(&observed.profiles, &desired.profiles);
    input.add_profiles = profiles.added;
    input.remove_profiles = profiles.removed;

    let behaviors = diff_values(&observed.behaviors, &desired.behaviors);
    input.add_behaviors = behaviors.added;
    input.remove_behaviors = behaviors.removed;

    let urls = diff_values(&observed.urls, &desired.urls);
    let url_ids = codec::index_ids(&observed.urls_ids, Separator::Url)?;
    input.remove_urls = codec::resolve_ids(&urls.removed, &url_ids, Separator::Url)?;
    input.add_urls = urls.added;

    let practices = diff(&observed.practices, &desired.practices, PracticeWrapper::signature);
    input.add_practices = practices
        .added
        .iter()
        .filter(|wrapper| wrapper.is_complete())
        .map(PracticeWrapper::to_input)
        .collect();
    input.remove_practices = practices
        .removed
        .into_iter()
        .filter(PracticeWrapper::is_complete)
        .map(|wrapper| wrapper.id)
        .collect();

    let settings = reconcile_settings(
        &observed.proxy_settings,
        &observed.virtual_settings,
        &desired.proxy_settings,
        &desired.virtual_settings,
    )?;
    input.add_proxy_setting = settings.add;
    input.update_proxy_setting = settings.update;
    input.remove_proxy_setting = settings.remove;

    update_source_identifiers(&observed.source_identifiers, &desired.source_identifiers, &mut input)?;

    let tags = diff(&observed.tags, &desired.tags, Tag::signature);
    input.add_tags = tags
        .added
        .into_iter()
        .filter(Tag::is_complete)
        .map(|tag| TagInput {
            key: tag.key,
            value: tag.value,
        })
        .collect();
    for tag in tags.removed.into_iter().filter(Tag::is_complete) {
        if tag.id.is_empty() {
            log::warn!("Tag {} has no recorded id, leaving it", tag.signature());
            continue;
        }
        input.remove_tags.push(tag.id);
    }

    Ok(input)
}

fn render(remote: RemoteAsset) -> Result<WebAsset> {
    let (proxy_settings, virtual_settings) = unflatten(&remote.proxy_settings)?;

    let practices = remote
        .practices
        .into_iter()
        .map(|wrapper| PracticeWrapper {
            id: wrapper.practice.id,
            main_mode: wrapper.main_mode,
            sub_practices_modes: wrapper
                .sub_practice_modes
                .into_iter()
                .map(|mode| (mode.sub_practice, mode.mode))
                .collect(),
            triggers: ids(wrapper.triggers),
        })
        .collect();

    let source_identifiers = remote
        .source_identifiers
        .into_iter()
        .map(|identifier| SourceIdentifier {
            identifier: identifier.source_identifier,
            values_ids: identifier
                .values
                .iter()
                .map(|v| codec::encode(&v.value, &v.id, Separator::Value))
                .collect(),
            values: identifier.values.into_iter().map(|v| v.value).collect(),
            id: identifier.id,
        })
        .collect();

    Ok(WebAsset {
        id: remote.id,
        name: remote.name,
        state: (!remote.state.is_empty()).then_some(remote.state),
        upstream_url: (!remote.upstream_url.is_empty()).then_some(remote.upstream_url),
        is_shares_urls: Some(remote.is_shares_urls),
        profiles: ids(remote.profiles),
        behaviors: ids(remote.behaviors),
        urls_ids: remote
            .urls
            .iter()
            .map(|u| codec::encode(&u.url, &u.id, Separator::Url))
            .collect(),
        urls: remote.urls.into_iter().map(|u| u.url).collect(),
        practices,
        proxy_settings,
        source_identifiers,
        tags: remote.tags,
        virtual_settings,
    })
}

/// Drop the blocking object from the matching remove list.
fn relax(input: &mut AssetUpdateInput, blocker: &DependencyBlocker) -> bool {
    let list = match blocker {
        DependencyBlocker::Profile(_) => &mut input.remove_profiles,
        DependencyBlocker::Practice(_) => &mut input.remove_practices,
        DependencyBlocker::Behavior(_) => &mut input.remove_behaviors,
    };
    let before = list.len();
    list.retain(|id| id != blocker.id());
    list.len() < before
}

// ============================================================================
// Resource Kinds
// ============================================================================

/// A web application asset.
pub struct WebApplicationAsset;

/// A web API asset.
pub struct WebApiAsset;

macro_rules! asset_resource {
    ($kind:ty, $name:literal) => {
        impl Resource for $kind {
            type Desired = WebAsset;
            type Observed = WebAsset;
            type Remote = RemoteAsset;
            type CreateInput = AssetCreateInput;
            type UpdateInput = AssetUpdateInput;

            const KIND: &'static str = $name;

            fn create_input(desired: &WebAsset) -> Result<AssetCreateInput> {
                create_input(desired)
            }

            fn update_input(observed: &WebAsset, desired: &WebAsset) -> Result<AssetUpdateInput> {
                update_input(observed, desired)
            }

            fn render(remote: RemoteAsset) -> Result<WebAsset> {
                render(remote)
            }

            fn remote_id(remote: &RemoteAsset) -> &str {
                &remote.id
            }

            fn observed_id(observed: &WebAsset) -> &str {
                &observed.id
            }

            fn relax(input: &mut AssetUpdateInput, blocker: &DependencyBlocker) -> bool {
                relax(input, blocker)
            }
        }
    };
}

asset_resource!(WebApplicationAsset, "web_application_asset");
asset_resource!(WebApiAsset, "web_api_asset");

macro_rules! asset_fields {
    () => {
        "id name state upstreamURL isSharesURLs
        practices { mainMode subPracticeModes { mode subPractice } practice { id } triggers { id } }
        profiles { id } behaviors { id } tags { id key value }
        sourceIdentifiers { id sourceIdentifier values { id IdentifierValue } }
        proxySetting { id key value } URLs { id URL }"
    };
}

const DELETE_ASSET: Document = Document {
    operation: "deleteAsset",
    query: "mutation deleteAsset($id: ID!) { deleteAsset(id: $id) }",
};

impl GraphqlResource for WebApplicationAsset {
    const CREATE: Document = Document {
        operation: "newWebApplicationAsset",
        query: "mutation newWebApplicationAsset($assetInput: WebApplicationAssetInput!) { newWebApplicationAsset(assetInput: $assetInput) { id name } }",
    };
    const FETCH: Document = Document {
        operation: "getWebApplicationAsset",
        query: concat!(
            "query getWebApplicationAsset($id: ID!) { getWebApplicationAsset(id: $id) { ",
            asset_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateWebApplicationAsset",
        query: "mutation updateWebApplicationAsset($assetInput: WebApplicationAssetUpdateInput!, $id: ID!) { updateWebApplicationAsset(assetInput: $assetInput, id: $id) }",
    };
    const DELETE: Document = DELETE_ASSET;
    const INPUT: &'static str = "assetInput";
}

impl GraphqlResource for WebApiAsset {
    const CREATE: Document = Document {
        operation: "newWebAPIAsset",
        query: "mutation newWebAPIAsset($assetInput: WebAPIAssetInput!) { newWebAPIAsset(assetInput: $assetInput) { id name } }",
    };
    const FETCH: Document = Document {
        operation: "getWebAPIAsset",
        query: concat!(
            "query getWebAPIAsset($id: ID!) { getWebAPIAsset(id: $id) { ",
            asset_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateWebAPIAsset",
        query: "mutation updateWebAPIAsset($assetInput: WebAPIAssetUpdateInput!, $id: ID!) { updateWebAPIAsset(assetInput: $assetInput, id: $id) }",
    };
    const DELETE: Document = DELETE_ASSET;
    const INPUT: &'static str = "assetInput";
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::flatten::{HEADER, REDIRECT_TO_HTTPS};
    use reconcile::{CustomHeader, Error};
    use serde_json::json;

    fn observed() -> WebAsset {
        render(
            serde_json::from_value(json!({
                "id": "asset-1",
                "name": "shop",
                "state": "Active",
                "upstreamURL": "http://backend:8080",
                "isSharesURLs": false,
                "practices": [{
                    "mainMode": "Prevent",
                    "subPracticeModes": [{"mode": "Detect", "subPractice": "IPS"}],
                    "practice": {"id": "p-1"},
                    "triggers": [{"id": "t-1"}]
                }],
                "profiles": [{"id": "prof-1"}, {"id": "prof-2"}],
                "behaviors": null,
                "tags": [{"id": "tag-1", "key": "env", "value": "prod"}],
                "sourceIdentifiers": [{
                    "id": "si-1",
                    "sourceIdentifier": "HeaderKey",
                    "values": [{"id": "v-1", "IdentifierValue": "x-a"}, {"id": "v-2", "IdentifierValue": "x-b"}]
                }],
                "proxySetting": [
                    {"id": "ps-1", "key": "timeout", "value": "30"},
                    {"id": "ps-2", "key": "redirectToHttps", "value": "true"},
                    {"id": "ps-3", "key": "isSetHeader", "value": "true"},
                    {"id": "ps-4", "key": "setHeader", "value": "X-Frame:DENY"}
                ],
                "URLs": [{"id": "u-1", "URL": "a"}, {"id": "u-2", "URL": "b"}]
            }))
            .unwrap(),
        )
        .unwrap()
    }

    fn declared(observed: &WebAsset) -> WebAsset {
        let mut desired = observed.clone();
        desired.id.clear();
        desired.urls_ids.clear();
        desired
    }

    #[test]
    fn test_render_splits_settings_and_encodes_ids() {
        let asset = observed();
        assert_eq!(asset.urls, vec!["a", "b"]);
        assert_eq!(asset.urls_ids, vec!["a;;;;u-1", "b;;;;u-2"]);
        assert_eq!(asset.source_identifiers[0].values_ids, vec!["x-a;;;v-1", "x-b;;;v-2"]);
        assert_eq!(asset.proxy_settings, vec![FlattenedSetting::new("timeout", "30").with_id("ps-1")]);
        assert_eq!(asset.virtual_settings.redirect_to_https, Some(true));
        assert_eq!(asset.virtual_settings.custom_headers[0].name, "X-Frame");
        assert_eq!(asset.practices[0].sub_practices_modes["IPS"], "Detect");
        assert!(asset.behaviors.is_empty());
    }

    #[test]
    fn test_unchanged_declaration_is_empty_update() {
        let current = observed();
        let input = update_input(&current, &declared(&current)).unwrap();
        assert!(input.is_empty(), "unexpected payload: {input:?}");
    }

    #[test]
    fn test_removing_last_url_sends_its_id() {
        let current = observed();
        let mut desired = declared(&current);
        desired.urls = vec!["a".to_string()];

        let input = update_input(&current, &desired).unwrap();

        assert_eq!(input.remove_urls, vec!["u-2"]);
        assert!(input.add_urls.is_empty());
        assert_eq!(serde_json::to_value(&input).unwrap(), json!({"removeURLs": ["u-2"]}));
    }

    #[test]
    fn test_url_without_recorded_id_is_malformed() {
        let mut current = observed();
        current.urls_ids.pop();
        let mut desired = declared(&current);
        desired.urls = vec!["a".to_string()];

        let err = update_input(&current, &desired).unwrap_err();
        assert!(matches!(err, Error::MalformedCompositeId { .. }));
    }

    #[test]
    fn test_practice_mode_change_replaces_wrapper() {
        let current = observed();
        let mut desired = declared(&current);
        desired.practices[0].main_mode = "Detect".to_string();

        let input = update_input(&current, &desired).unwrap();

        assert_eq!(input.remove_practices, vec!["p-1"]);
        assert_eq!(input.add_practices.len(), 1);
        assert_eq!(input.add_practices[0].main_mode, "Detect");
        assert_eq!(
            serde_json::to_value(&input.add_practices[0]).unwrap(),
            json!({
                "practiceId": "p-1",
                "mainMode": "Detect",
                "subPracticeModes": [{"mode": "Detect", "subPractice": "IPS"}],
                "triggers": ["t-1"]
            })
        );
    }

    #[test]
    fn test_incomplete_wrapper_is_dropped() {
        let current = observed();
        let mut desired = declared(&current);
        desired.practices.push(PracticeWrapper {
            id: "p-2".to_string(),
            main_mode: "Prevent".to_string(),
            sub_practices_modes: BTreeMap::from([("WebBot".to_string(), String::new())]),
            triggers: Vec::new(),
        });

        let input = update_input(&current, &desired).unwrap();
        assert!(input.add_practices.is_empty());
    }

    #[test]
    fn test_source_identifier_values_diff() {
        let current = observed();
        let mut desired = declared(&current);
        desired.source_identifiers[0].values = vec!["x-a".to_string(), "x-c".to_string()];

        let input = update_input(&current, &desired).unwrap();

        assert_eq!(
            input.update_source_identifiers,
            vec![SourceIdentifierUpdate {
                id: "si-1".to_string(),
                source_identifier: "HeaderKey".to_string(),
                add_values: vec!["x-c".to_string()],
                remove_values: vec!["v-2".to_string()],
                update_values: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_dropped_source_identifier_is_removed() {
        let current = observed();
        let mut desired = declared(&current);
        desired.source_identifiers.clear();
        desired.source_identifiers.push(SourceIdentifier {
            identifier: "Cookie".to_string(),
            values: vec!["session".to_string()],
            ..SourceIdentifier::default()
        });

        let input = update_input(&current, &desired).unwrap();

        assert_eq!(input.remove_source_identifiers, vec!["si-1"]);
        assert_eq!(input.add_source_identifiers[0].source_identifier, "Cookie");
    }

    #[test]
    fn test_tags_and_settings_share_one_payload() {
        let current = observed();
        let mut desired = declared(&current);
        desired.tags = vec![
            Tag {
                key: "env".to_string(),
                value: "staging".to_string(),
                id: String::new(),
            },
            Tag {
                key: String::new(),
                value: "orphan".to_string(),
                id: String::new(),
            },
        ];
        desired.proxy_settings[0].value = "60".to_string();
        desired.virtual_settings.custom_headers = vec![CustomHeader::new("X-Frame", "SAMEORIGIN")];

        let input = update_input(&current, &desired).unwrap();

        assert_eq!(input.remove_tags, vec!["tag-1"]);
        assert_eq!(
            input.add_tags,
            vec![TagInput {
                key: "env".to_string(),
                value: "staging".to_string()
            }]
        );
        assert_eq!(input.update_proxy_setting[0].id, "ps-1");
        assert_eq!(input.remove_proxy_setting, vec!["ps-4"]);
        assert_eq!(input.add_proxy_setting[0].key, HEADER);
        assert_eq!(input.add_proxy_setting[0].value, "X-Frame:SAMEORIGIN");
    }

    #[test]
    fn test_undeclared_toggle_is_left_alone() {
        let current = observed();
        let mut desired = declared(&current);
        desired.virtual_settings.redirect_to_https = None;
        desired.state = None;

        let input = update_input(&current, &desired).unwrap();
        assert!(input.is_empty());
    }

    #[test]
    fn test_plain_setting_with_reserved_key_is_rejected() {
        let current = observed();
        let mut desired = declared(&current);
        desired
            .proxy_settings
            .push(FlattenedSetting::new(REDIRECT_TO_HTTPS, "false"));

        let err = update_input(&current, &desired).unwrap_err();
        assert!(matches!(err, Error::ConflictingVirtualSetting { .. }));
    }

    #[test]
    fn test_create_input_from_manifest() {
        let desired: WebAsset = serde_json::from_value(json!({
            "name": "api",
            "upstream_url": "http://api:9000",
            "urls": ["https://api.example.com"],
            "profiles": ["prof-1"],
            "redirect_to_https": true,
            "tags": [{"key": "team", "value": "edge"}]
        }))
        .unwrap();

        let input = create_input(&desired).unwrap();

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "name": "api",
                "profiles": ["prof-1"],
                "tags": [{"key": "team", "value": "edge"}],
                "proxySetting": [{"key": "redirectToHttps", "value": "true"}],
                "upstreamURL": "http://api:9000",
                "URLs": ["https://api.example.com"]
            })
        );
    }

    #[test]
    fn test_relax_drops_blocker_once() {
        let mut input = AssetUpdateInput {
            remove_profiles: vec!["prof-1".to_string(), "prof-2".to_string()],
            remove_behaviors: vec!["b-1".to_string()],
            ..AssetUpdateInput::default()
        };

        assert!(relax(&mut input, &DependencyBlocker::Profile("prof-2".to_string())));
        assert_eq!(input.remove_profiles, vec!["prof-1"]);
        assert!(!relax(&mut input, &DependencyBlocker::Profile("prof-2".to_string())));
        assert!(!relax(&mut input, &DependencyBlocker::Practice("b-1".to_string())));
        assert!(relax(&mut input, &DependencyBlocker::Behavior("b-1".to_string())));
    }

    #[test]
    fn test_detach_payload() {
        assert_eq!(
            serde_json::to_value(AssetUpdateInput::detach(ReferenceKind::Practice, "p-9")).unwrap(),
            json!({"removePractices": ["p-9"]})
        );
        assert_eq!(
            serde_json::to_value(AssetUpdateInput::detach(ReferenceKind::Behavior, "b-9")).unwrap(),
            json!({"removeBehaviors": ["b-9"]})
        );
        assert_eq!(
            serde_json::to_value(AssetUpdateInput::detach(ReferenceKind::Profile, "gw-9")).unwrap(),
            json!({"removeProfiles": ["gw-9"]})
        );
        assert!(AssetUpdateInput::detach(ReferenceKind::Trigger, "t-9").is_empty());
    }

    #[test]
    fn test_without_trigger_rewraps_only_affected_practices() {
        let asset = WebAsset {
            id: "a-1".to_string(),
            name: "shop".to_string(),
            practices: vec![
                PracticeWrapper {
                    id: "p-1".to_string(),
                    main_mode: "Prevent".to_string(),
                    sub_practices_modes: BTreeMap::new(),
                    triggers: vec!["t-1".to_string(), "t-2".to_string()],
                },
                PracticeWrapper {
                    id: "p-2".to_string(),
                    main_mode: "Learn".to_string(),
                    sub_practices_modes: BTreeMap::new(),
                    triggers: vec!["t-2".to_string()],
                },
            ],
            ..WebAsset::default()
        };

        let input = AssetUpdateInput::without_trigger(&asset, &["p-1".to_string()], "t-1");

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "addPractices": [{"practiceId": "p-1", "mainMode": "Prevent", "triggers": ["t-2"]}],
                "removePractices": ["p-1"]
            })
        );
        assert!(AssetUpdateInput::without_trigger(&asset, &["p-2".to_string()], "t-1").is_empty());
    }
}
