use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::models::{UserConfig, UserStatus};

/// Per-attribute change flags between the recorded and the desired
/// configuration of a user, computed once before an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub status: bool,
    /// Standard or custom profile attributes.
    pub profile: bool,
    pub password: bool,
    pub password_hash: bool,
    pub password_inline_hook: bool,
    pub recovery_question: bool,
    pub recovery_answer: bool,
    pub admin_roles: bool,
    pub group_memberships: bool,
}

impl UserChanges {
    pub fn between(prior: &UserConfig, desired: &UserConfig) -> Self {
        Self {
            status: status_changed(prior.status, desired.status),
            profile: prior.profile != desired.profile
                || custom_attributes_changed(
                    prior.custom_profile_attributes.as_ref(),
                    desired.custom_profile_attributes.as_ref(),
                ),
            password: secret_changed(&prior.password, &desired.password),
            password_hash: desired.password_hash.is_some()
                && prior.password_hash != desired.password_hash,
            password_inline_hook: prior.password_inline_hook != desired.password_inline_hook,
            recovery_question: secret_changed(&prior.recovery_question, &desired.recovery_question),
            recovery_answer: secret_changed(&prior.recovery_answer, &desired.recovery_answer),
            admin_roles: set_changed(prior.admin_roles.as_ref(), desired.admin_roles.as_ref()),
            group_memberships: set_changed(
                prior.group_memberships.as_ref(),
                desired.group_memberships.as_ref(),
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether anything other than the status changed. A deprovisioned user
    /// accepts none of these.
    pub fn touches_profile(&self) -> bool {
        self.profile || self.password || self.recovery_question || self.recovery_answer
    }

    /// Whether the full profile has to be resubmitted.
    pub fn requires_profile_update(&self) -> bool {
        self.profile || self.password_hash || self.password_inline_hook
    }

    pub fn recovery(&self) -> bool {
        self.recovery_question || self.recovery_answer
    }

    /// Names of the changed attributes, for plans and logs.
    pub fn changed_attributes(&self) -> Vec<&'static str> {
        [
            ("status", self.status),
            ("profile", self.profile),
            ("password", self.password),
            ("password_hash", self.password_hash),
            ("password_inline_hook", self.password_inline_hook),
            ("recovery_question", self.recovery_question),
            ("recovery_answer", self.recovery_answer),
            ("admin_roles", self.admin_roles),
            ("group_memberships", self.group_memberships),
        ]
        .into_iter()
        .filter_map(|(name, changed)| changed.then_some(name))
        .collect()
    }
}

/// A user the remote system still reports as PROVISIONED or
/// PASSWORD_EXPIRED already satisfies a desired ACTIVE.
fn status_changed(prior: UserStatus, desired: UserStatus) -> bool {
    match (prior, desired) {
        (UserStatus::Provisioned | UserStatus::PasswordExpired, UserStatus::Active) => false,
        (prior, desired) => prior != desired,
    }
}

/// Absent desired custom attributes leave the recorded ones alone.
fn custom_attributes_changed(
    prior: Option<&Map<String, Value>>,
    desired: Option<&Map<String, Value>>,
) -> bool {
    let Some(desired) = desired else {
        return false;
    };
    match prior {
        Some(prior) => prior != desired,
        None => !desired.is_empty(),
    }
}

/// Credentials cannot be cleared remotely, so only a new value is a change.
fn secret_changed(prior: &Option<String>, desired: &Option<String>) -> bool {
    desired.is_some() && prior != desired
}

/// `None` leaves the relation unmanaged.
fn set_changed(prior: Option<&BTreeSet<String>>, desired: Option<&BTreeSet<String>>) -> bool {
    match desired {
        None => false,
        Some(desired) => prior.map_or(!desired.is_empty(), |prior| prior != desired),
    }
}
