use std::collections::BTreeSet;

use tracing::{debug, info};

use super::{ReconcileResult, Step, StepContext, map_status, payload, update_user_status};
use crate::{
    client::{AssignRoleRequest, CreateUserRequest, DirectoryApi},
    config::ReconcilerConfig,
    models::{UserConfig, UserState, UserStatus},
    schema::validate_user,
};

/// Create a user and apply its roles, groups and final status.
///
/// The identifier is recorded in `state` as soon as the remote user exists.
/// A failing follow-up step is returned as is; the partially configured user
/// is left in place and `state` reflects what was applied.
pub async fn create(
    client: &dyn DirectoryApi,
    desired: &UserConfig,
    state: &mut UserState,
    config: &ReconcilerConfig,
) -> ReconcileResult<()> {
    validate_user(desired)?;

    let request = CreateUserRequest {
        profile: payload::profile(&desired.profile, desired.custom_profile_attributes.as_ref()),
        credentials: payload::create_credentials(desired),
    };
    let activate = desired.status != UserStatus::Staged;
    let user = client
        .create_user(&request, activate)
        .await
        .step(Step::CreateUser)?;
    info!(user_id = %user.id, login = %desired.login(), activate = activate, "Created user");

    let user_id = user.id.clone();
    state.record_id(user.id);
    state.raw_status = Some(user.status);
    state.attributes = UserConfig {
        status: map_status(user.status),
        admin_roles: None,
        group_memberships: None,
        ..desired.clone()
    };

    if let Some(roles) = &desired.admin_roles {
        let assigned = state.attributes.admin_roles.insert(BTreeSet::new());
        for role_type in roles {
            let request = AssignRoleRequest {
                role_type: role_type.clone(),
            };
            client
                .assign_role(&user_id, &request, config.disable_role_notifications)
                .await
                .step(Step::AssignRole)?;
            debug!(user_id = %user_id, role = %role_type, "Assigned admin role");
            assigned.insert(role_type.clone());
        }
    }

    if let Some(groups) = &desired.group_memberships {
        let joined = state.attributes.group_memberships.insert(BTreeSet::new());
        for group_id in groups {
            client
                .add_user_to_group(group_id, &user_id)
                .await
                .step(Step::AddGroup)?;
            debug!(user_id = %user_id, group_id = %group_id, "Added user to group");
            joined.insert(group_id.clone());
        }
    }

    if matches!(
        desired.status,
        UserStatus::Suspended | UserStatus::Deprovisioned
    ) {
        update_user_status(client, &user_id, desired.status, config).await?;
        state.raw_status = Some(desired.status);
        state.attributes.status = desired.status;
    }

    if desired.expire_password_on_create {
        client
            .expire_password(&user_id)
            .await
            .step(Step::ExpirePassword)?;
        state.raw_status = Some(UserStatus::PasswordExpired);
        debug!(user_id = %user_id, "Expired password");
    }

    Ok(())
}
