use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ProfileAttributes;

/// Lifecycle status of a remote user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// Created without activation.
    Staged,
    /// Activated but the user has not finished the activation workflow.
    Provisioned,
    #[default]
    Active,
    /// Password reset in progress.
    Recovery,
    PasswordExpired,
    LockedOut,
    Suspended,
    /// Deactivated; the only state from which a user can be deleted.
    Deprovisioned,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staged => "STAGED",
            Self::Provisioned => "PROVISIONED",
            Self::Active => "ACTIVE",
            Self::Recovery => "RECOVERY",
            Self::PasswordExpired => "PASSWORD_EXPIRED",
            Self::LockedOut => "LOCKED_OUT",
            Self::Suspended => "SUSPENDED",
            Self::Deprovisioned => "DEPROVISIONED",
        }
    }

    /// Statuses a configuration may ask for.
    pub const CONFIGURABLE: [UserStatus; 4] = [
        UserStatus::Active,
        UserStatus::Staged,
        UserStatus::Deprovisioned,
        UserStatus::Suspended,
    ];

    pub fn is_configurable(&self) -> bool {
        Self::CONFIGURABLE.contains(self)
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STAGED" => Ok(Self::Staged),
            "PROVISIONED" => Ok(Self::Provisioned),
            "ACTIVE" => Ok(Self::Active),
            "RECOVERY" => Ok(Self::Recovery),
            "PASSWORD_EXPIRED" => Ok(Self::PasswordExpired),
            "LOCKED_OUT" => Ok(Self::LockedOut),
            "SUSPENDED" => Ok(Self::Suspended),
            "DEPROVISIONED" => Ok(Self::Deprovisioned),
            other => Err(format!("unknown user status '{other}'")),
        }
    }
}

/// Hash algorithms accepted for password import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
pub enum HashAlgorithm {
    #[serde(rename = "BCRYPT")]
    Bcrypt,
    #[serde(rename = "SHA-512")]
    Sha512,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "MD5")]
    Md5,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bcrypt => "BCRYPT",
            Self::Sha512 => "SHA-512",
            Self::Sha256 => "SHA-256",
            Self::Sha1 => "SHA-1",
            Self::Md5 => "MD5",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the salt was prepended or appended to the password before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum SaltOrder {
    Prefix,
    Postfix,
}

/// A precomputed password hash to import instead of a plaintext password.
///
/// For the SHA family and MD5, `value` is the base64 digest of the password
/// (and salt, if used). For BCRYPT it is the radix64-encoded hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PasswordHash {
    pub algorithm: HashAlgorithm,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt_order: Option<SaltOrder>,
    /// BCRYPT only, 1-20.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_factor: Option<u8>,
}

/// Desired configuration of a user, as written by the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
pub struct UserConfig {
    #[serde(flatten)]
    pub profile: ProfileAttributes,

    /// Attributes outside the standard profile, passed through as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_profile_attributes: Option<Map<String, Value>>,

    #[serde(default)]
    pub status: UserStatus,

    /// Admin role types (`APP_ADMIN`, `USER_ADMIN`, ...). `None` leaves roles
    /// unmanaged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_roles: Option<BTreeSet<String>>,

    /// Group ids. `None` leaves memberships unmanaged; an empty set removes
    /// every membership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_memberships: Option<BTreeSet<String>>,

    /// Skip the role listing on read.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_roles: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Current password, when it was changed outside of this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<PasswordHash>,

    /// Password inline hook type; only `"default"` is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_inline_hook: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_question: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_answer: Option<String>,

    /// Force a password change at first login. Requires `password`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expire_password_on_create: bool,
}

impl UserConfig {
    pub fn login(&self) -> &str {
        self.profile.login.as_deref().unwrap_or_default()
    }
}

/// Recorded state of a managed user.
///
/// The identifier is assigned by the remote system on creation and never
/// changes afterwards; it is only cleared when the user is found to be gone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
pub struct UserState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    /// Status exactly as reported by the remote system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<UserStatus>,

    #[serde(flatten)]
    pub attributes: UserConfig,
}

impl UserState {
    /// A state with only an identifier, as produced by import.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_created(&self) -> bool {
        self.id.is_some()
    }

    /// Record the identifier assigned on creation. An identifier that is
    /// already recorded is kept.
    pub(crate) fn record_id(&mut self, id: String) {
        match &self.id {
            None => self.id = Some(id),
            Some(existing) if *existing != id => {
                tracing::warn!(
                    recorded = %existing,
                    received = %id,
                    "Ignoring attempt to replace a recorded user id"
                );
            }
            Some(_) => {}
        }
    }

    /// Forget the identifier after the remote user disappeared.
    pub(crate) fn clear_id(&mut self) {
        self.id = None;
    }
}
