//! Web-API practices: IPS, API attacks and OpenAPI schema validation.

use super::web_practice::{Ips, IpsInput, RemoteIps, declared_change, non_empty, render_ips};
use super::{changed, default_visibility};
use crate::backend::{Document, GraphqlResource};
use reconcile::flatten::{decode_file_data, encode_file_data};
use reconcile::{Mutation, Presence, ReferenceKind, Resource, Result};
use serde::{Deserialize, Serialize};

/// Joins the schema file name to its data URL.
const FILE_NAME_SEPARATOR: &str = ";$$:$$;";
const SCHEMA_MIME_TYPE: &str = "application/octet-stream";

// ============================================================================
// Declared / Observed State
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAdvancedSetting {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
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
pub struct ApiAttacks {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_setting: Option<ApiAdvancedSetting>,
}

/// An OpenAPI schema file checked against incoming requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaValidation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub filename: String,
    /// File content, not encoded.
    pub data: String,
    /// Size reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl SchemaValidation {
    fn same_file(&self, other: &Self) -> bool {
        self.filename == other.filename && self.data == other.data
    }

    fn encoded(&self) -> String {
        format!(
            "{}{FILE_NAME_SEPARATOR}{}",
            self.filename,
            encode_file_data(SCHEMA_MIME_TYPE, &self.data)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebApiPractice {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ips: Option<Ips>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_attacks: Option<ApiAttacks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_validation: Option<SchemaValidation>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub practice_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default)]
    pub default: bool,
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAdvancedSettingInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
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

impl ApiAdvancedSettingInput {
    fn new(old: Option<&ApiAdvancedSetting>, new: &ApiAdvancedSetting) -> Self {
        let numeric = |field: fn(&ApiAdvancedSetting) -> Option<i64>| match old {
            Some(old) => Presence::of_change(field(old).as_ref(), field(new).as_ref()),
            None => Presence::of_declared(field(new).as_ref()),
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
            body_size: numeric(|s| s.body_size),
            url_size: numeric(|s| s.url_size),
            header_size: numeric(|s| s.header_size),
            max_object_depth: numeric(|s| s.max_object_depth),
            illegal_http_methods: illegal_http_methods
                .map(|allowed| (if allowed { "Yes" } else { "No" }).to_string()),
        }
    }

    fn has_changes(&self) -> bool {
        self.body_size.is_present()
            || self.url_size.is_present()
            || self.header_size.is_present()
            || self.max_object_depth.is_present()
            || self.illegal_http_methods.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAttacksInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced_setting: Option<ApiAdvancedSettingInput>,
}

impl ApiAttacksInput {
    fn new(old: Option<&ApiAttacks>, new: &ApiAttacks) -> Self {
        let old_setting = old.and_then(|a| a.advanced_setting.as_ref());
        Self {
            id: old.map(|a| a.id.clone()).unwrap_or_default(),
            minimum_severity: match old {
                Some(old) => {
                    declared_change(old.minimum_severity.as_ref(), new.minimum_severity.as_ref())
                }
                None => new.minimum_severity.clone(),
            },
            advanced_setting: new
                .advanced_setting
                .as_ref()
                .map(|setting| ApiAdvancedSettingInput::new(old_setting, setting))
                .filter(|setting| old_setting.is_none() || setting.has_changes()),
        }
    }

    fn has_changes(&self) -> bool {
        self.minimum_severity.is_some() || self.advanced_setting.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaValidationInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// `<file name>;$$:$$;<data URL>`.
    #[serde(rename = "OasSchema")]
    pub oas_schema: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebApiPracticeCreateInput {
    pub name: String,
    pub visibility: String,
    #[serde(rename = "IPS", skip_serializing_if = "Option::is_none")]
    pub ips: Option<IpsInput>,
    #[serde(rename = "APIAttacks", skip_serializing_if = "Option::is_none")]
    pub api_attacks: Option<ApiAttacksInput>,
    #[serde(rename = "SchemaValidation", skip_serializing_if = "Option::is_none")]
    pub schema_validation: Option<SchemaValidationInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebApiPracticeUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(rename = "IPS", skip_serializing_if = "Option::is_none")]
    pub ips: Option<IpsInput>,
    #[serde(rename = "APIAttacks", skip_serializing_if = "Option::is_none")]
    pub api_attacks: Option<ApiAttacksInput>,
    #[serde(rename = "SchemaValidation", skip_serializing_if = "Option::is_none")]
    pub schema_validation: Option<SchemaValidationInput>,
}

impl Mutation for WebApiPracticeUpdateInput {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.visibility.is_none()
            && self.ips.is_none()
            && self.api_attacks.is_none()
            && self.schema_validation.is_none()
    }
}

// ============================================================================
// Backend Objects
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteApiAdvancedSetting {
    #[serde(default)]
    pub id: String,
    pub body_size: Option<i64>,
    pub url_size: Option<i64>,
    pub header_size: Option<i64>,
    pub max_object_depth: Option<i64>,
    pub illegal_http_methods: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteApiAttacks {
    #[serde(default)]
    pub id: String,
    pub minimum_severity: Option<String>,
    pub advanced_setting: Option<RemoteApiAdvancedSetting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSchemaFile {
    pub data: Option<String>,
    pub name: Option<String>,
    pub size: Option<u64>,
    pub is_file_exist: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSchemaValidation {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "OasSchema")]
    pub oas_schema: Option<RemoteSchemaFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWebApiPractice {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub visibility: Option<String>,
    pub practice_type: Option<String>,
    pub category: Option<String>,
    pub default: Option<bool>,
    #[serde(rename = "IPS")]
    pub ips: Option<RemoteIps>,
    #[serde(rename = "APIAttacks")]
    pub api_attacks: Option<RemoteApiAttacks>,
    #[serde(rename = "SchemaValidation")]
    pub schema_validation: Option<RemoteSchemaValidation>,
}

// ============================================================================
// Conversions
// ============================================================================

/// The schema block, or `None` when the backend holds no file.
fn render_schema(remote: RemoteSchemaValidation) -> Result<Option<SchemaValidation>> {
    let Some(file) = remote.oas_schema else {
        return Ok(None);
    };
    let filename = file.name.unwrap_or_default();
    if filename.is_empty() && file.is_file_exist != Some(true) {
        return Ok(None);
    }
    let (_, data) = decode_file_data(file.data.as_deref().unwrap_or_default())?;
    Ok(Some(SchemaValidation {
        id: remote.id,
        filename,
        data,
        size: file.size,
    }))
}

pub struct WebApiPracticeResource;

impl Resource for WebApiPracticeResource {
    type Desired = WebApiPractice;
    type Observed = WebApiPractice;
    type Remote = RemoteWebApiPractice;
    type CreateInput = WebApiPracticeCreateInput;
    type UpdateInput = WebApiPracticeUpdateInput;

    const KIND: &'static str = "web_api_practice";
    const REFERENCE: Option<ReferenceKind> = Some(ReferenceKind::Practice);

    fn create_input(desired: &WebApiPractice) -> Result<WebApiPracticeCreateInput> {
        Ok(WebApiPracticeCreateInput {
            name: desired.name.clone(),
            visibility: desired.visibility.clone(),
            ips: desired.ips.as_ref().map(|ips| IpsInput::new(ips, "")),
            api_attacks: desired
                .api_attacks
                .as_ref()
                .map(|attacks| ApiAttacksInput::new(None, attacks)),
            schema_validation: desired.schema_validation.as_ref().map(|schema| {
                SchemaValidationInput {
                    id: String::new(),
                    oas_schema: schema.encoded(),
                }
            }),
        })
    }

    fn update_input(
        observed: &WebApiPractice,
        desired: &WebApiPractice,
    ) -> Result<WebApiPracticeUpdateInput> {
        let mut input = WebApiPracticeUpdateInput {
            name: changed(&observed.name, &desired.name),
            visibility: changed(&observed.visibility, &desired.visibility),
            ..WebApiPracticeUpdateInput::default()
        };

        if let Some(ips) = &desired.ips {
            input.ips = match &observed.ips {
                Some(old) => Some(IpsInput::changes(old, ips)).filter(IpsInput::has_changes),
                None => Some(IpsInput::new(ips, "")),
            };
        }

        if let Some(attacks) = &desired.api_attacks {
            let update = ApiAttacksInput::new(observed.api_attacks.as_ref(), attacks);
            if observed.api_attacks.is_none() || update.has_changes() {
                input.api_attacks = Some(update);
            }
        }

        if let Some(schema) = &desired.schema_validation {
            let old = observed.schema_validation.as_ref();
            if !old.is_some_and(|old| old.same_file(schema)) {
                input.schema_validation = Some(SchemaValidationInput {
                    id: old.map(|o| o.id.clone()).unwrap_or_default(),
                    oas_schema: schema.encoded(),
                });
            }
        }

        Ok(input)
    }

    fn render(remote: RemoteWebApiPractice) -> Result<WebApiPractice> {
        let api_attacks = remote.api_attacks.map(|attacks| ApiAttacks {
            id: attacks.id,
            minimum_severity: non_empty(attacks.minimum_severity),
            advanced_setting: attacks.advanced_setting.map(|setting| ApiAdvancedSetting {
                id: setting.id,
                body_size: setting.body_size,
                url_size: setting.url_size,
                header_size: setting.header_size,
                max_object_depth: setting.max_object_depth,
                illegal_http_methods: setting.illegal_http_methods.as_deref().map(|v| v == "Yes"),
            }),
        });

        let schema_validation = match remote.schema_validation {
            Some(schema) => render_schema(schema)?,
            None => None,
        };

        Ok(WebApiPractice {
            id: remote.id,
            name: remote.name,
            visibility: remote.visibility.unwrap_or_else(default_visibility),
            ips: remote.ips.map(render_ips),
            api_attacks,
            schema_validation,
            practice_type: remote.practice_type.unwrap_or_default(),
            category: remote.category.unwrap_or_default(),
            default: remote.default.unwrap_or_default(),
        })
    }

    fn remote_id(remote: &RemoteWebApiPractice) -> &str {
        &remote.id
    }

    fn observed_id(observed: &WebApiPractice) -> &str {
        &observed.id
    }
}

macro_rules! web_api_practice_fields {
    () => {
        "id name practiceType category default visibility
        IPS { id performanceImpact severityLevel protectionsFromYear highConfidence mediumConfidence lowConfidence }
        APIAttacks { id minimumSeverity advancedSetting { id bodySize urlSize headerSize maxObjectDepth illegalHttpMethods } }
        SchemaValidation { id OasSchema { data name size isFileExist } }"
    };
}

impl GraphqlResource for WebApiPracticeResource {
    const CREATE: Document = Document {
        operation: "newWebAPIPractice",
        query: concat!(
            "mutation newWebAPIPractice($practiceInput: WebAPIPracticeInput) ",
            "{ newWebAPIPractice(practiceInput: $practiceInput) { ",
            web_api_practice_fields!(),
            " } }"
        ),
    };
    const FETCH: Document = Document {
        operation: "getWebAPIPractice",
        query: concat!(
            "query getWebAPIPractice($id: ID!) { getWebAPIPractice(id: $id) { ",
            web_api_practice_fields!(),
            " } }"
        ),
    };
    const UPDATE: Document = Document {
        operation: "updateWebAPIPractice",
        query: "mutation updateWebAPIPractice($practiceInput: WebAPIPracticeUpdateInput, $id: ID!) { updateWebAPIPractice(practiceInput: $practiceInput, id: $id) }",
    };
    const DELETE: Document = Document {
        operation: "deletePractice",
        query: "mutation deletePractice($id: ID!) { deletePractice(id: $id) }",
    };
    const INPUT: &'static str = "practiceInput";
}
