//! The user reconciler.
//!
//! Every operation takes the remote API as an argument and works against an
//! explicit [`UserChanges`] computed once up front. Steps run strictly in
//! order; the first failure aborts the rest. Whatever was committed before
//! the failure stays committed and is reflected in the recorded
//! [`UserState`].

mod apply;
mod create;
mod delete;
mod delta;
mod payload;
mod read;
mod status;
#[cfg(test)]
pub(crate) mod testing;
mod update;

use std::fmt;

pub use apply::apply;
pub use create::create;
pub use delete::delete;
pub use delta::Delta;
pub use read::{ReadOutcome, import, read};
pub use status::{map_status, update_user_status};
pub use update::update;
use validator::ValidationErrors;

use crate::{
    client::ClientError,
    models::{UserConfig, UserState, UserStatus},
    schema::UserChanges,
};

/// A remote step of a reconciliation, named in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateUser,
    ReadUser,
    FetchUser,
    TransitionStatus,
    ExpirePassword,
    UpdateProfile,
    ListRoles,
    RemoveRole,
    AssignRole,
    ListGroups,
    AddGroup,
    RemoveGroup,
    ChangePassword,
    SetPassword,
    ChangeRecoveryQuestion,
    DeleteUser,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateUser => "create user",
            Self::ReadUser => "read user",
            Self::FetchUser => "get user",
            Self::TransitionStatus => "update user status",
            Self::ExpirePassword => "expire user's password",
            Self::UpdateProfile => "update user",
            Self::ListRoles => "list user's roles",
            Self::RemoveRole => "remove role from user",
            Self::AssignRole => "assign admin role to user",
            Self::ListGroups => "list user's groups",
            Self::AddGroup => "add user to group",
            Self::RemoveGroup => "remove user from group",
            Self::ChangePassword => "change user's password",
            Self::SetPassword => "set user's password",
            Self::ChangeRecoveryQuestion => "change user's password recovery question",
            Self::DeleteUser => "deprovision or delete user",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("invalid user configuration: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(
        "Okta will not allow a user to be updated to STAGED. Can set to STAGED on user creation only"
    )]
    StagedTransition,

    #[error(
        "can not change password for provisioned user, the activation workflow should be \
         finished first. Please, check this diagram \
         https://developer.okta.com/docs/reference/api/users/#user-status for more details. You \
         can activate the user by setting status to ACTIVE"
    )]
    PasswordChangeWhileProvisioned,

    #[error("Only the status of a DEPROVISIONED user can be updated, we detected other change")]
    DeprovisionedProfileChange,

    #[error(
        "user {user_id} did not finish transitioning to {target} after {attempts} status checks"
    )]
    StatusTransitionTimeout {
        user_id: String,
        target: UserStatus,
        attempts: u32,
    },

    #[error("failed to {step}: {source}")]
    Remote {
        step: Step,
        #[source]
        source: ClientError,
    },

    #[error("user has no recorded id; it has not been created")]
    NotCreated,
}

impl ReconcileError {
    /// The step whose remote call failed, if any.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Remote { step, .. } => Some(*step),
            _ => None,
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Attach the failing step to a remote error.
pub(crate) trait StepContext<T> {
    fn step(self, step: Step) -> ReconcileResult<T>;
}

impl<T> StepContext<T> for Result<T, ClientError> {
    fn step(self, step: Step) -> ReconcileResult<T> {
        self.map_err(|source| ReconcileError::Remote { step, source })
    }
}

/// What applying a desired configuration to the recorded state would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Create,
    Update(UserChanges),
    NoChange,
}

impl Plan {
    pub fn for_user(state: &UserState, desired: &UserConfig) -> Self {
        if !state.is_created() {
            return Self::Create;
        }
        let changes = UserChanges::between(&state.attributes, desired);
        if changes.is_empty() {
            Self::NoChange
        } else {
            Self::Update(changes)
        }
    }
}
