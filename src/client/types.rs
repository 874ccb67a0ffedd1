//! Request and response payloads of the remote API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{HashAlgorithm, PasswordHash, SaltOrder, UserStatus};

/// A user as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUser {
    pub id: String,
    pub status: UserStatus,
    /// Set while an asynchronous status change is still in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitioning_to_status: Option<UserStatus>,
    /// Raw profile; standard keys are camelCase, anything else is custom.
    #[serde(default)]
    pub profile: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_changed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredentialHash {
    pub algorithm: HashAlgorithm,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt_order: Option<SaltOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_factor: Option<u8>,
}

impl From<&PasswordHash> for PasswordCredentialHash {
    fn from(hash: &PasswordHash) -> Self {
        Self {
            algorithm: hash.algorithm,
            value: hash.value.clone(),
            salt: hash.salt.clone().filter(|s| !s.is_empty()),
            salt_order: hash.salt_order,
            // The work factor only means something for BCRYPT
            work_factor: match hash.algorithm {
                HashAlgorithm::Bcrypt => hash.work_factor,
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordCredentialHook {
    #[serde(rename = "type")]
    pub hook_type: String,
}

/// Exactly one of `value`, `hash` or `hook` is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<PasswordCredentialHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<PasswordCredentialHook>,
}

impl PasswordCredential {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn hash(hash: &PasswordHash) -> Self {
        Self {
            hash: Some(hash.into()),
            ..Default::default()
        }
    }

    pub fn hook(hook_type: impl Into<String>) -> Self {
        Self {
            hook: Some(PasswordCredentialHook {
                hook_type: hook_type.into(),
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryQuestionCredential {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_question: Option<RecoveryQuestionCredential>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub profile: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<UserCredentials>,
}

/// Body of a full (PUT) or partial (POST) user update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<UserCredentials>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: PasswordCredential,
    pub new_password: PasswordCredential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRoleRequest {
    #[serde(rename = "type")]
    pub role_type: String,
}

/// Query parameters of the application listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppQuery {
    /// Free-text search on name and label.
    pub q: Option<String>,
    /// Filter expression, e.g. `status eq "ACTIVE"`.
    pub filter: Option<String>,
    pub limit: Option<u32>,
}

/// One page of a listing and the continuation link to the next page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}
