//! Remote identity API.
//!
//! [`DirectoryApi`] is the seam between the reconciler and the network. The
//! production implementation is [`OktaClient`]; tests substitute a recording
//! fake.

mod error;
mod http;
mod retry;
#[cfg(test)]
pub(crate) mod test_utils;
mod types;

use async_trait::async_trait;
pub use error::*;
pub use http::OktaClient;
pub use retry::{is_retryable_error, with_max_retries, with_retry};
pub use types::*;

use crate::models::{Application, Group, Role};

/// Operations the provider needs from the identity API.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Create a user. With `activate = false` the user stays `STAGED`.
    async fn create_user(
        &self,
        request: &CreateUserRequest,
        activate: bool,
    ) -> ClientResult<RemoteUser>;

    /// Fetch a user by id or login.
    async fn get_user(&self, id_or_login: &str) -> ClientResult<RemoteUser>;

    /// Replace the user's profile (and credentials, if given).
    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> ClientResult<RemoteUser>;

    /// Merge the given fields into the user.
    async fn partial_update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> ClientResult<RemoteUser>;

    /// Deactivates an active user, or deletes one that is already
    /// `DEPROVISIONED`.
    async fn deactivate_or_delete_user(&self, user_id: &str) -> ClientResult<()>;

    async fn activate_user(&self, user_id: &str, send_email: bool) -> ClientResult<()>;

    async fn deactivate_user(&self, user_id: &str) -> ClientResult<()>;

    async fn suspend_user(&self, user_id: &str) -> ClientResult<()>;

    async fn unsuspend_user(&self, user_id: &str) -> ClientResult<()>;

    /// Force a password change at next login.
    async fn expire_password(&self, user_id: &str) -> ClientResult<()>;

    async fn change_password(
        &self,
        user_id: &str,
        request: &ChangePasswordRequest,
    ) -> ClientResult<()>;

    /// `credentials` carries the current password and the new recovery
    /// question.
    async fn change_recovery_question(
        &self,
        user_id: &str,
        credentials: &UserCredentials,
    ) -> ClientResult<()>;

    /// Roles assigned to the user, directly or through groups.
    async fn list_user_roles(&self, user_id: &str) -> ClientResult<Vec<Role>>;

    async fn assign_role(
        &self,
        user_id: &str,
        request: &AssignRoleRequest,
        disable_notifications: bool,
    ) -> ClientResult<Role>;

    async fn remove_role(&self, user_id: &str, role_assignment_id: &str) -> ClientResult<()>;

    /// Every group the user belongs to, across all pages.
    async fn list_user_groups(&self, user_id: &str) -> ClientResult<Vec<Group>>;

    async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> ClientResult<()>;

    async fn remove_user_from_group(&self, group_id: &str, user_id: &str) -> ClientResult<()>;

    async fn get_application(&self, app_id: &str) -> ClientResult<Application>;

    /// One page of applications. Pass the previous page's `next` link to
    /// continue a listing.
    async fn list_applications(
        &self,
        query: &AppQuery,
        next: Option<&str>,
    ) -> ClientResult<Page<Application>>;
}
