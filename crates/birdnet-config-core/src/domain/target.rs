//! Backup target configurations.
//!
//! A backup target is a destination that backup archives are stored to.  In
//! the document every target has the same outer shape:
//!
//! ```toml
//! [[backup.targets]]
//! type = "ftp"
//! enabled = true
//!
//! [backup.targets.settings]
//! host = "nas.local"
//! username = "birdnet"
//! usetls = true
//! ```
//!
//! The `type` discriminator selects which concrete payload the `settings`
//! table is decoded into.  Decoding happens once, while the document is
//! parsed, and never fails the parse: a target with an unknown `type` or a
//! wrongly typed key is kept together with the reason it cannot be used.
//! The `settings` table itself is kept as written, so saving the document
//! writes back every key, including ones no payload declares.
//!
//! # Validation and defaulting
//!
//! Each payload has its own `validate` routine.  Validation is allowed to
//! *mutate* the payload: absent optional numeric fields are filled with their
//! protocol default (FTP port 21, SFTP port 22, rsync port 22 when a remote
//! host is set).  A target is usable only once `validate` has succeeded.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use toml::{Table, Value};
use thiserror::Error;

/// Default control port for FTP/FTPS.
pub const DEFAULT_FTP_PORT: u16 = 21;
/// Default SSH port used by SFTP and remote rsync.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// The closed set of target kinds, keyed by the document's `type` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Local,
    Ftp,
    Sftp,
    S3,
    Rsync,
    GoogleDrive,
}

impl TargetKind {
    /// Every kind, in declaration order.
    pub const ALL: [TargetKind; 6] = [
        TargetKind::Local,
        TargetKind::Ftp,
        TargetKind::Sftp,
        TargetKind::S3,
        TargetKind::Rsync,
        TargetKind::GoogleDrive,
    ];

    /// The discriminator string written to the document.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Local => "local",
            TargetKind::Ftp => "ftp",
            TargetKind::Sftp => "sftp",
            TargetKind::S3 => "s3",
            TargetKind::Rsync => "rsync",
            TargetKind::GoogleDrive => "googledrive",
        }
    }
}

impl fmt::Display for TargetKind {
    /// Human-readable name used in error messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TargetKind::Local => "local",
            TargetKind::Ftp => "FTP",
            TargetKind::Sftp => "SFTP",
            TargetKind::S3 => "S3",
            TargetKind::Rsync => "rsync",
            TargetKind::GoogleDrive => "Google Drive",
        };
        f.write_str(label)
    }
}

impl FromStr for TargetKind {
    type Err = TargetError;

    /// Parses the discriminator case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        TargetKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| TargetError::UnknownType(s.to_string()))
    }
}

/// Errors produced while decoding or validating a target.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    /// A required field is empty.
    #[error("{kind} {field} cannot be empty")]
    MissingField {
        kind: TargetKind,
        field: &'static str,
    },

    /// The `type` discriminator does not name a known target kind.
    #[error("unknown backup target type {0:?}")]
    UnknownType(String),

    /// The `settings` table could not be decoded into the kind's payload.
    #[error("invalid {kind} target settings: {message}")]
    InvalidPayload { kind: TargetKind, message: String },
}

fn require(kind: TargetKind, field: &'static str, value: &str) -> Result<(), TargetError> {
    if value.trim().is_empty() {
        return Err(TargetError::MissingField { kind, field });
    }
    Ok(())
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Local file-system destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalTarget {
    /// Directory the archives are written to.
    pub path: String,
}

impl LocalTarget {
    /// Requires a non-empty `path`.
    pub fn validate(&mut self) -> Result<(), TargetError> {
        require(TargetKind::Local, "path", &self.path)
    }
}

/// FTP or FTPS server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FtpTarget {
    pub host: String,
    /// `0` means "use the default" and is replaced by 21 on validation.
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Remote directory.
    pub path: String,
    /// Use explicit FTP over TLS.
    #[serde(rename = "usetls")]
    pub use_tls: bool,
}

impl FtpTarget {
    /// Requires `host`; fills in port 21 when unset.
    pub fn validate(&mut self) -> Result<(), TargetError> {
        require(TargetKind::Ftp, "host", &self.host)?;
        if self.port == 0 {
            self.port = DEFAULT_FTP_PORT;
        }
        Ok(())
    }
}

/// SFTP server, authenticated by password or private key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SftpTarget {
    pub host: String,
    /// `0` means "use the default" and is replaced by 22 on validation.
    pub port: u16,
    pub username: String,
    /// Optional when `private_key_path` is set.
    pub password: String,
    #[serde(rename = "privatekeypath")]
    pub private_key_path: String,
    pub path: String,
}

impl SftpTarget {
    /// Requires `host` and `username`; fills in port 22 when unset.
    pub fn validate(&mut self) -> Result<(), TargetError> {
        require(TargetKind::Sftp, "host", &self.host)?;
        if self.port == 0 {
            self.port = DEFAULT_SSH_PORT;
        }
        require(TargetKind::Sftp, "username", &self.username)
    }
}

/// S3-compatible object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Target {
    /// Custom endpoint URL; empty means the AWS default for `region`.
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    #[serde(rename = "accesskeyid")]
    pub access_key_id: String,
    #[serde(rename = "secretaccesskey")]
    pub secret_access_key: String,
    /// Object key prefix.
    pub prefix: String,
    /// Talk to the endpoint over TLS.  Defaults to `true`.
    #[serde(rename = "usessl")]
    pub use_ssl: bool,
}

impl Default for S3Target {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: String::new(),
            bucket: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            prefix: String::new(),
            use_ssl: true,
        }
    }
}

impl S3Target {
    /// Requires `bucket` and `region`.
    pub fn validate(&mut self) -> Result<(), TargetError> {
        require(TargetKind::S3, "bucket", &self.bucket)?;
        require(TargetKind::S3, "region", &self.region)
    }
}

/// rsync destination, either local or over SSH.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsyncTarget {
    /// Remote host; empty for a local rsync.
    pub host: String,
    /// SSH port, only meaningful when `host` is set.
    pub port: u16,
    pub username: String,
    pub path: String,
    #[serde(rename = "sshkeypath")]
    pub ssh_key_path: String,
    /// Extra command-line options passed to rsync.
    pub options: Vec<String>,
}

impl RsyncTarget {
    /// Requires `path`; fills in port 22 only for remote targets.
    pub fn validate(&mut self) -> Result<(), TargetError> {
        require(TargetKind::Rsync, "path", &self.path)?;
        if !self.host.trim().is_empty() && self.port == 0 {
            self.port = DEFAULT_SSH_PORT;
        }
        Ok(())
    }

    /// Whether the destination is reached over SSH.
    pub fn is_remote(&self) -> bool {
        !self.host.trim().is_empty()
    }
}

/// Google Drive folder, accessed with a service account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleDriveTarget {
    /// Path to the service-account credentials JSON.
    #[serde(rename = "credentialspath")]
    pub credentials_path: String,
    /// Destination folder id; empty means the drive root.
    #[serde(rename = "folderid")]
    pub folder_id: String,
}

impl GoogleDriveTarget {
    /// Requires `credentials_path`.
    pub fn validate(&mut self) -> Result<(), TargetError> {
        require(TargetKind::GoogleDrive, "credentials path", &self.credentials_path)
    }
}

// ── Tagged union ──────────────────────────────────────────────────────────────

/// A decoded target payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSettings {
    Local(LocalTarget),
    Ftp(FtpTarget),
    Sftp(SftpTarget),
    S3(S3Target),
    Rsync(RsyncTarget),
    GoogleDrive(GoogleDriveTarget),
}

impl TargetSettings {
    /// Decodes a raw `settings` table into the payload selected by `kind`.
    ///
    /// Missing keys take the payload's defaults; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::InvalidPayload`] when a key has the wrong type.
    pub fn from_payload(kind: TargetKind, payload: Table) -> Result<Self, TargetError> {
        let value = Value::Table(payload);
        let invalid = |e: toml::de::Error| TargetError::InvalidPayload {
            kind,
            message: e.message().to_string(),
        };
        Ok(match kind {
            TargetKind::Local => TargetSettings::Local(value.try_into().map_err(invalid)?),
            TargetKind::Ftp => TargetSettings::Ftp(value.try_into().map_err(invalid)?),
            TargetKind::Sftp => TargetSettings::Sftp(value.try_into().map_err(invalid)?),
            TargetKind::S3 => TargetSettings::S3(value.try_into().map_err(invalid)?),
            TargetKind::Rsync => TargetSettings::Rsync(value.try_into().map_err(invalid)?),
            TargetKind::GoogleDrive => {
                TargetSettings::GoogleDrive(value.try_into().map_err(invalid)?)
            }
        })
    }

    /// The payload's fields as a `settings` table.
    pub fn to_payload(&self) -> Table {
        let value = match self {
            TargetSettings::Local(s) => Value::try_from(s),
            TargetSettings::Ftp(s) => Value::try_from(s),
            TargetSettings::Sftp(s) => Value::try_from(s),
            TargetSettings::S3(s) => Value::try_from(s),
            TargetSettings::Rsync(s) => Value::try_from(s),
            TargetSettings::GoogleDrive(s) => Value::try_from(s),
        };
        // Payloads hold only strings, integers, booleans and string lists.
        match value {
            Ok(Value::Table(table)) => table,
            _ => Table::new(),
        }
    }

    /// The kind of this payload.
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetSettings::Local(_) => TargetKind::Local,
            TargetSettings::Ftp(_) => TargetKind::Ftp,
            TargetSettings::Sftp(_) => TargetKind::Sftp,
            TargetSettings::S3(_) => TargetKind::S3,
            TargetSettings::Rsync(_) => TargetKind::Rsync,
            TargetSettings::GoogleDrive(_) => TargetKind::GoogleDrive,
        }
    }

    /// Validates the payload and fills in its defaults.
    pub fn validate(&mut self) -> Result<(), TargetError> {
        match self {
            TargetSettings::Local(s) => s.validate(),
            TargetSettings::Ftp(s) => s.validate(),
            TargetSettings::Sftp(s) => s.validate(),
            TargetSettings::S3(s) => s.validate(),
            TargetSettings::Rsync(s) => s.validate(),
            TargetSettings::GoogleDrive(s) => s.validate(),
        }
    }
}

/// One entry of `backup.targets`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawBackupTarget")]
pub struct BackupTarget {
    /// Disabled targets are kept in the document but never written to.
    pub enabled: bool,
    /// `type` exactly as written.
    target_type: String,
    /// `settings` exactly as written.
    payload: Table,
    decoded: Result<TargetSettings, TargetError>,
}

impl BackupTarget {
    pub fn new(enabled: bool, settings: TargetSettings) -> Self {
        Self {
            enabled,
            target_type: settings.kind().as_str().to_string(),
            payload: settings.to_payload(),
            decoded: Ok(settings),
        }
    }

    /// The `type` string as written in the document.
    pub fn type_name(&self) -> &str {
        &self.target_type
    }

    /// The target kind, or `None` when `type` names no known kind.
    pub fn kind(&self) -> Option<TargetKind> {
        self.target_type.parse().ok()
    }

    /// The decoded payload before defaults are applied, or why the `settings`
    /// table could not be decoded.
    pub fn settings(&self) -> Result<&TargetSettings, &TargetError> {
        self.decoded.as_ref()
    }

    /// The `settings` table as it is written back to the document.
    pub fn payload(&self) -> &Table {
        &self.payload
    }

    /// Replaces the typed payload.
    ///
    /// Keys the payload does not declare are kept as long as the kind stays
    /// the same; switching kinds starts from an empty table.
    pub fn set_settings(&mut self, settings: TargetSettings) {
        let kind = settings.kind();
        if self.kind() != Some(kind) {
            self.target_type = kind.as_str().to_string();
            self.payload.clear();
        }
        self.payload.extend(settings.to_payload());
        self.decoded = Ok(settings);
    }

    /// Returns a validated, defaulted copy of the payload.
    ///
    /// The stored payload is left untouched so the document keeps exactly
    /// what the user wrote.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::UnknownType`] or [`TargetError::InvalidPayload`]
    /// when the entry could not be decoded, otherwise the payload's
    /// [`TargetError::MissingField`].
    pub fn resolve(&self) -> Result<TargetSettings, TargetError> {
        let mut settings = self.decoded.clone()?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Document shape of a target before the payload is decoded.
#[derive(Deserialize)]
struct RawBackupTarget {
    #[serde(rename = "type", default)]
    target_type: String,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    settings: Table,
}

impl From<RawBackupTarget> for BackupTarget {
    fn from(raw: RawBackupTarget) -> Self {
        let decoded = raw
            .target_type
            .parse::<TargetKind>()
            .and_then(|kind| TargetSettings::from_payload(kind, raw.settings.clone()));
        Self {
            enabled: raw.enabled,
            target_type: raw.target_type,
            payload: raw.settings,
            decoded,
        }
    }
}

impl Serialize for BackupTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BackupTarget", 3)?;
        state.serialize_field("type", &self.target_type)?;
        state.serialize_field("enabled", &self.enabled)?;
        state.serialize_field("settings", &self.payload)?;
        state.end()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
