//! Virtual sub-resources on top of the generic settings collection.
//!
//! The backend only knows a flat list of `(key, value, id)` proxy settings.
//! Certificates, instruction blocks, custom headers and a couple of toggles
//! are stored there under fixed key namespaces. This module maps typed
//! records onto those keys, reads them back, and computes the unified
//! settings delta for an update.
//!
//! File slots follow one rule set:
//!
//! | observed  | declared  | result                                           |
//! |-----------|-----------|--------------------------------------------------|
//! | none      | disabled  | nothing                                          |
//! | none      | enabled   | add enable, data, file name                      |
//! | enabled   | disabled  | enable = "false", remove data and file name      |
//! | disabled  | enabled   | enable = "true", update or add data and file name|
//! | enabled   | enabled   | update data and file name where changed          |
//! | any       | none      | remove every recorded ID of the slot             |

use crate::diff::{diff, keyed_diff};
use crate::error::{Error, Result};
use crate::settings::{FlattenedSetting, SettingInput, SettingsDelta};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const REDIRECT_TO_HTTPS: &str = "redirectToHttps";
pub const ACCESS_LOG: &str = "accessLog";
pub const HEADER_ENABLE: &str = "isSetHeader";
pub const HEADER: &str = "setHeader";

/// Setting keys of one file slot.
#[derive(Debug, PartialEq, Eq)]
pub struct FileKeys {
    pub enable: &'static str,
    pub data: &'static str,
    pub file_name: &'static str,
}

static CLIENT_CERTIFICATE: FileKeys = FileKeys {
    enable: "isUpstreamTrustedCAFile",
    data: "upstreamTrustedCAFile",
    file_name: "upstreamTrustedCAFileName",
};

static SERVER_CERTIFICATE: FileKeys = FileKeys {
    enable: "isTrustedCAListFile",
    data: "trustedCAListFile",
    file_name: "trustedCAListFileName",
};

static LOCATION_BLOCK: FileKeys = FileKeys {
    enable: "isLocationConfigFile",
    data: "locationConfigFile",
    file_name: "locationConfigFileName",
};

static SERVER_BLOCK: FileKeys = FileKeys {
    enable: "isServerConfigFile",
    data: "serverConfigFile",
    file_name: "serverConfigFileName",
};

static FILE_KEYS: [&FileKeys; 4] = [
    &CLIENT_CERTIFICATE,
    &SERVER_CERTIFICATE,
    &LOCATION_BLOCK,
    &SERVER_BLOCK,
];

/// Check whether a key belongs to a virtual namespace.
pub fn is_virtual_key(key: &str) -> bool {
    matches!(key, REDIRECT_TO_HTTPS | ACCESS_LOG | HEADER_ENABLE | HEADER)
        || FILE_KEYS
            .iter()
            .any(|keys| key == keys.enable || key == keys.data || key == keys.file_name)
}

const fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn parse_bool(setting: &FlattenedSetting) -> Result<bool> {
    setting.value.parse().map_err(|_| {
        Error::conversion(
            format!("setting {}", setting.key),
            format!("expected \"true\" or \"false\", got {:?}", setting.value),
        )
    })
}

fn non_empty(id: &str) -> Option<String> {
    (!id.is_empty()).then(|| id.to_string())
}

// ============================================================================
// File Data Encoding
// ============================================================================

/// Encode file content as a base64 data URL.
pub fn encode_file_data(mime_type: &str, content: &str) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(content))
}

/// Decode a data URL into `(mime type, content)`.
///
/// A value without `base64,` decodes to empty content.
pub fn decode_file_data(raw: &str) -> Result<(String, String)> {
    let mime_type = raw
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(';'))
        .map(|(mime, _)| mime.to_string())
        .unwrap_or_default();

    let Some((_, encoded)) = raw.split_once("base64,") else {
        return Ok((mime_type, String::new()));
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| Error::conversion(format!("file data {raw:?}"), e.to_string()))?;
    let content = String::from_utf8(bytes)
        .map_err(|e| Error::conversion(format!("file data {raw:?}"), e.to_string()))?;
    Ok((mime_type, content))
}

/// A file format with a MIME type mapping.
pub trait FileFormat: Copy + Default + PartialEq {
    fn mime_type(self) -> &'static str;

    /// Canonical format for a MIME type. Unknown types map to the default.
    fn from_mime_type(mime_type: &str) -> Self;
}

/// A slot a virtual file can occupy.
pub trait FileSlot: Copy + PartialEq + 'static {
    const ALL: &'static [Self];

    fn keys(self) -> &'static FileKeys;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateSlot {
    Client,
    Server,
}

impl FileSlot for CertificateSlot {
    const ALL: &'static [Self] = &[Self::Client, Self::Server];

    fn keys(self) -> &'static FileKeys {
        match self {
            Self::Client => &CLIENT_CERTIFICATE,
            Self::Server => &SERVER_CERTIFICATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockSlot {
    Location,
    Server,
}

impl FileSlot for BlockSlot {
    const ALL: &'static [Self] = &[Self::Location, Self::Server];

    fn keys(self) -> &'static FileKeys {
        match self {
            Self::Location => &LOCATION_BLOCK,
            Self::Server => &SERVER_BLOCK,
        }
    }
}

/// Certificate file formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateFormat {
    #[default]
    Pem,
    Der,
    Cer,
    Crt,
    P12,
    Pfx,
    P7b,
    P7c,
}

impl FileFormat for CertificateFormat {
    fn mime_type(self) -> &'static str {
        match self {
            Self::Pem => "application/octet-stream",
            Self::Der | Self::Cer | Self::Crt => "application/x-x509-ca-cert",
            Self::P12 | Self::Pfx => "application/x-pkcs12",
            Self::P7b => "application/x-pkcs7-certificates",
            Self::P7c => "application/pkcs7-mime",
        }
    }

    fn from_mime_type(mime_type: &str) -> Self {
        match mime_type {
            "application/x-x509-ca-cert" => Self::Der,
            "application/x-pkcs12" => Self::P12,
            "application/x-pkcs7-certificates" => Self::P7b,
            "application/pkcs7-mime" => Self::P7c,
            _ => Self::Pem,
        }
    }
}

/// Instruction block formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockFormat {
    Json,
    #[default]
    Yaml,
}

impl FileFormat for BlockFormat {
    fn mime_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/octet-stream",
        }
    }

    fn from_mime_type(mime_type: &str) -> Self {
        match mime_type {
            "application/json" => Self::Json,
            _ => Self::Yaml,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Backend IDs of the settings behind one file slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl SlotIds {
    pub fn is_empty(&self) -> bool {
        self.enable.is_none() && self.data.is_none() && self.file_name.is_none()
    }
}

/// A file stored across the enable/data/file-name settings of one slot.
///
/// `data` holds the plain content; the backend sees it as a data URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFile<S, F> {
    pub slot: S,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub format: F,
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "SlotIds::is_empty")]
    pub ids: SlotIds,
}

pub type Certificate = VirtualFile<CertificateSlot, CertificateFormat>;
pub type InstructionBlock = VirtualFile<BlockSlot, BlockFormat>;

impl<S: FileSlot, F: FileFormat> VirtualFile<S, F> {
    /// The stored form of `data`. Formats sharing a MIME type compare equal.
    pub fn encoded_data(&self) -> String {
        encode_file_data(self.format.mime_type(), &self.data)
    }

    fn flatten_into(&self, out: &mut Vec<FlattenedSetting>) {
        let keys = self.slot.keys();
        let id = |id: &Option<String>| id.clone().unwrap_or_default();
        out.push(FlattenedSetting::new(keys.enable, bool_str(self.enable)).with_id(id(&self.ids.enable)));
        if !self.data.is_empty() || self.ids.data.is_some() {
            out.push(FlattenedSetting::new(keys.data, self.encoded_data()).with_id(id(&self.ids.data)));
        }
        if !self.file_name.is_empty() || self.ids.file_name.is_some() {
            out.push(
                FlattenedSetting::new(keys.file_name, self.file_name.clone())
                    .with_id(id(&self.ids.file_name)),
            );
        }
    }
}

/// A custom response header, stored as `name:value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHeader {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl CustomHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            id: None,
        }
    }

    /// Stored value and diff signature.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.name, self.value)
    }

    fn parse(setting: &FlattenedSetting) -> Result<Self> {
        let (name, value) = setting.value.split_once(':').ok_or_else(|| {
            Error::conversion(
                format!("setting {}", setting.key),
                format!("expected name:value, got {:?}", setting.value),
            )
        })?;
        Ok(Self {
            name: name.to_string(),
            value: value.to_string(),
            id: non_empty(&setting.id),
        })
    }
}

/// IDs of the single-setting virtual entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to_https: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_enable: Option<String>,
}

impl VirtualIds {
    pub fn is_empty(&self) -> bool {
        self.redirect_to_https.is_none() && self.access_log.is_none() && self.header_enable.is_none()
    }
}

/// Every virtual sub-resource of one asset.
///
/// Toggles left as `None` are not managed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<Certificate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<InstructionBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_headers: Vec<CustomHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to_https: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_log: Option<bool>,
    #[serde(default, skip_serializing_if = "VirtualIds::is_empty")]
    pub ids: VirtualIds,
}

impl VirtualSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Flatten every record into settings, carrying recorded IDs.
    pub fn flatten(&self) -> Vec<FlattenedSetting> {
        let mut out = Vec::new();
        for certificate in &self.certificates {
            certificate.flatten_into(&mut out);
        }
        for block in &self.blocks {
            block.flatten_into(&mut out);
        }

        if !self.custom_headers.is_empty() || self.ids.header_enable.is_some() {
            out.push(
                FlattenedSetting::new(HEADER_ENABLE, bool_str(!self.custom_headers.is_empty()))
                    .with_id(self.ids.header_enable.clone().unwrap_or_default()),
            );
        }
        for header in &self.custom_headers {
            out.push(
                FlattenedSetting::new(HEADER, header.signature())
                    .with_id(header.id.clone().unwrap_or_default()),
            );
        }

        for (key, value, id) in [
            (REDIRECT_TO_HTTPS, self.redirect_to_https, &self.ids.redirect_to_https),
            (ACCESS_LOG, self.access_log, &self.ids.access_log),
        ] {
            if let Some(value) = value {
                out.push(FlattenedSetting::new(key, bool_str(value)).with_id(id.clone().unwrap_or_default()));
            }
        }
        out
    }
}

// ============================================================================
// Unflatten
// ============================================================================

fn assemble_files<S: FileSlot, F: FileFormat>(
    claimed: &HashMap<&str, &FlattenedSetting>,
) -> Result<Vec<VirtualFile<S, F>>> {
    let mut files = Vec::new();
    for &slot in S::ALL {
        let keys = slot.keys();
        let enable = claimed.get(keys.enable).copied();
        let data = claimed.get(keys.data).copied();
        let file_name = claimed.get(keys.file_name).copied();
        if enable.is_none() && data.is_none() && file_name.is_none() {
            continue;
        }

        let (format, content) = match data {
            Some(setting) => {
                let (mime_type, content) = decode_file_data(&setting.value)?;
                (F::from_mime_type(&mime_type), content)
            }
            None => (F::default(), String::new()),
        };

        files.push(VirtualFile {
            slot,
            enable: enable.map(parse_bool).transpose()?.unwrap_or(false),
            file_name: file_name.map(|s| s.value.clone()).unwrap_or_default(),
            format,
            data: content,
            ids: SlotIds {
                enable: enable.and_then(|s| non_empty(&s.id)),
                data: data.and_then(|s| non_empty(&s.id)),
                file_name: file_name.and_then(|s| non_empty(&s.id)),
            },
        });
    }
    Ok(files)
}

/// Split an observed settings collection into plain settings and typed
/// virtual records.
///
/// Two settings with the same non-header virtual key and different values
/// are reported as [`Error::ConflictingVirtualSetting`].
pub fn unflatten(settings: &[FlattenedSetting]) -> Result<(Vec<FlattenedSetting>, VirtualSettings)> {
    let mut plain = Vec::new();
    let mut virtuals = VirtualSettings::default();
    let mut claimed: HashMap<&str, &FlattenedSetting> = HashMap::new();

    for setting in settings {
        if setting.key == HEADER {
            virtuals.custom_headers.push(CustomHeader::parse(setting)?);
        } else if is_virtual_key(&setting.key) {
            if let Some(existing) = claimed.insert(setting.key.as_str(), setting)
                && existing.value != setting.value
            {
                return Err(Error::ConflictingVirtualSetting {
                    key: setting.key.clone(),
                    existing: existing.value.clone(),
                    conflicting: setting.value.clone(),
                });
            }
        } else {
            plain.push(setting.clone());
        }
    }

    virtuals.certificates = assemble_files(&claimed)?;
    virtuals.blocks = assemble_files(&claimed)?;

    if let Some(setting) = claimed.get(HEADER_ENABLE) {
        virtuals.ids.header_enable = non_empty(&setting.id);
    }
    if let Some(setting) = claimed.get(REDIRECT_TO_HTTPS) {
        virtuals.redirect_to_https = Some(parse_bool(setting)?);
        virtuals.ids.redirect_to_https = non_empty(&setting.id);
    }
    if let Some(setting) = claimed.get(ACCESS_LOG) {
        virtuals.access_log = Some(parse_bool(setting)?);
        virtuals.ids.access_log = non_empty(&setting.id);
    }

    Ok((plain, virtuals))
}

// ============================================================================
// Reconcile
// ============================================================================

fn reconcile_files<S: FileSlot, F: FileFormat>(
    old: &[VirtualFile<S, F>],
    new: &[VirtualFile<S, F>],
    delta: &mut SettingsDelta,
) {
    for &slot in S::ALL {
        let keys = slot.keys();
        let before = old.iter().rev().find(|file| file.slot == slot);
        let after = new.iter().rev().find(|file| file.slot == slot);

        match (before, after) {
            (None, None) => {}
            (None, Some(after)) => {
                if !after.enable {
                    log::debug!("Skipping disabled {} with no prior setting", keys.enable);
                    continue;
                }
                delta.add(keys.enable, "true");
                delta.add(keys.data, after.encoded_data());
                delta.add(keys.file_name, after.file_name.clone());
            }
            (Some(before), None) => {
                delta.remove(before.ids.enable.as_deref());
                delta.remove(before.ids.data.as_deref());
                delta.remove(before.ids.file_name.as_deref());
            }
            (Some(before), Some(after)) => match (before.enable, after.enable) {
                (true, false) => {
                    delta.upsert(before.ids.enable.as_deref(), keys.enable, "false");
                    delta.remove(before.ids.data.as_deref());
                    delta.remove(before.ids.file_name.as_deref());
                }
                (false, true) => {
                    delta.upsert(before.ids.enable.as_deref(), keys.enable, "true");
                    delta.upsert(before.ids.data.as_deref(), keys.data, &after.encoded_data());
                    delta.upsert(before.ids.file_name.as_deref(), keys.file_name, &after.file_name);
                }
                (true, true) => {
                    let encoded = after.encoded_data();
                    if before.encoded_data() != encoded {
                        delta.upsert(before.ids.data.as_deref(), keys.data, &encoded);
                    }
                    if before.file_name != after.file_name {
                        delta.upsert(before.ids.file_name.as_deref(), keys.file_name, &after.file_name);
                    }
                }
                (false, false) => {}
            },
        }
    }
}

fn reconcile_headers(old: &VirtualSettings, new: &VirtualSettings, delta: &mut SettingsDelta) {
    let headers = diff(&old.custom_headers, &new.custom_headers, CustomHeader::signature);
    for header in &headers.removed {
        if header.id.is_none() {
            log::warn!("Custom header {} has no recorded id, leaving it", header.name);
        }
        delta.remove(header.id.as_deref());
    }
    for header in &headers.added {
        delta.add(HEADER, header.signature());
    }

    match (old.custom_headers.is_empty(), new.custom_headers.is_empty()) {
        (true, false) => delta.upsert(old.ids.header_enable.as_deref(), HEADER_ENABLE, "true"),
        (false, true) => {
            if let Some(id) = &old.ids.header_enable {
                delta.update(id.as_str(), HEADER_ENABLE, "false");
            }
        }
        _ => {}
    }
}

fn reconcile_toggle(
    key: &str,
    old: Option<bool>,
    id: Option<&str>,
    new: Option<bool>,
    delta: &mut SettingsDelta,
) {
    match new {
        Some(value) if old != Some(value) => delta.upsert(id, key, bool_str(value)),
        _ => {}
    }
}

fn reconcile_plain(
    old: &[FlattenedSetting],
    new: &[FlattenedSetting],
    delta: &mut SettingsDelta,
) -> Result<()> {
    if let Some(reserved) = new.iter().find(|s| is_virtual_key(&s.key)) {
        return Err(Error::ConflictingVirtualSetting {
            key: reserved.key.clone(),
            existing: "reserved virtual key".to_string(),
            conflicting: reserved.value.clone(),
        });
    }

    let settings = keyed_diff(old, new, |s| s.key.clone(), |a, b| a.value != b.value);
    for setting in settings.added {
        delta.add(setting.key, setting.value);
    }
    for (before, after) in settings.updated {
        delta.upsert(Some(before.id.as_str()), &after.key, &after.value);
    }
    for setting in settings.removed {
        if is_virtual_key(&setting.key) {
            continue;
        }
        delta.remove(Some(setting.id.as_str()));
    }
    Ok(())
}

/// Compute one settings delta covering plain settings and every virtual
/// sub-resource.
///
/// Declaring a plain setting under a virtual key is rejected.
pub fn reconcile_settings(
    old_plain: &[FlattenedSetting],
    old_virtual: &VirtualSettings,
    new_plain: &[FlattenedSetting],
    new_virtual: &VirtualSettings,
) -> Result<SettingsDelta> {
    let mut delta = SettingsDelta::default();
    reconcile_plain(old_plain, new_plain, &mut delta)?;
    reconcile_files(&old_virtual.certificates, &new_virtual.certificates, &mut delta);
    reconcile_files(&old_virtual.blocks, &new_virtual.blocks, &mut delta);
    reconcile_headers(old_virtual, new_virtual, &mut delta);
    reconcile_toggle(
        REDIRECT_TO_HTTPS,
        old_virtual.redirect_to_https,
        old_virtual.ids.redirect_to_https.as_deref(),
        new_virtual.redirect_to_https,
        &mut delta,
    );
    reconcile_toggle(
        ACCESS_LOG,
        old_virtual.access_log,
        old_virtual.ids.access_log.as_deref(),
        new_virtual.access_log,
        &mut delta,
    );
    Ok(delta)
}

/// Settings to send when creating an asset. Disabled files are left out.
pub fn creation_settings(plain: &[FlattenedSetting], virtuals: &VirtualSettings) -> Result<Vec<SettingInput>> {
    reconcile_settings(&[], &VirtualSettings::default(), plain, virtuals).map(|delta| delta.add)
}
