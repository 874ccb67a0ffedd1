use tracing::{debug, info};

use super::{ReconcileError, ReconcileResult, Step, StepContext, map_status};
use crate::{
    client::{DirectoryApi, NotFoundExt, RemoteUser},
    models::{ProfileAttributes, Role, UserState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Found,
    /// The remote user no longer exists; the recorded id was cleared.
    Gone,
}

/// Refresh the recorded state from the remote user.
///
/// Configuration-only attributes (credentials, `skip_roles`, ...) are left
/// as recorded. Group memberships are only refreshed when they are tracked.
pub async fn read(client: &dyn DirectoryApi, state: &mut UserState) -> ReconcileResult<ReadOutcome> {
    let user_id = state.id().ok_or(ReconcileError::NotCreated)?.to_string();

    let Some(user) = client
        .get_user(&user_id)
        .await
        .ok_if_not_found()
        .step(Step::ReadUser)?
    else {
        info!(user_id = %user_id, "User no longer exists, removing from state");
        state.clear_id();
        return Ok(ReadOutcome::Gone);
    };

    apply_remote(state, user);
    refresh_relations(client, &user_id, state).await?;
    Ok(ReadOutcome::Found)
}

/// Build a recorded state for an existing user, looked up by id or login.
pub async fn import(client: &dyn DirectoryApi, id_or_login: &str) -> ReconcileResult<UserState> {
    let user = client
        .get_user(id_or_login)
        .await
        .step(Step::ReadUser)?;
    let user_id = user.id.clone();

    let mut state = UserState::with_id(user_id.as_str());
    apply_remote(&mut state, user);
    refresh_relations(client, &user_id, &mut state).await?;

    info!(user_id = %user_id, login = %state.attributes.login(), "Imported user");
    Ok(state)
}

/// Flatten the remote profile: standard keys into the attributes, every
/// other non-null key into the custom attributes.
fn apply_remote(state: &mut UserState, user: RemoteUser) {
    let mut profile = user.profile;
    state.attributes.profile = ProfileAttributes::take_from_remote(&mut profile);
    profile.retain(|_, value| !value.is_null());
    state.attributes.custom_profile_attributes = (!profile.is_empty()).then_some(profile);
    state.raw_status = Some(user.status);
    state.attributes.status = map_status(user.status);
}

async fn refresh_relations(
    client: &dyn DirectoryApi,
    user_id: &str,
    state: &mut UserState,
) -> ReconcileResult<()> {
    if !state.attributes.skip_roles {
        let roles = client
            .list_user_roles(user_id)
            .await
            .step(Step::ListRoles)?;
        state.attributes.admin_roles = Some(
            roles
                .into_iter()
                .filter(Role::is_user_assigned)
                .map(|role| role.role_type)
                .collect(),
        );
    }

    if state.attributes.group_memberships.is_some() {
        let groups = client
            .list_user_groups(user_id)
            .await
            .step(Step::ListGroups)?;
        state.attributes.group_memberships = Some(
            groups
                .into_iter()
                .filter(|group| !group.is_built_in())
                .map(|group| group.id)
                .collect(),
        );
    }

    debug!(user_id = %user_id, "Refreshed user relations");
    Ok(())
}
