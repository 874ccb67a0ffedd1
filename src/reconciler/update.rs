use tracing::{debug, info, warn};

use super::{
    Delta, ReconcileError, ReconcileResult, Step, StepContext, payload, update_user_status,
};
use crate::{
    client::{
        AssignRoleRequest, ChangePasswordRequest, DirectoryApi, NotFoundExt, PasswordCredential,
        RecoveryQuestionCredential, UserCredentials, UserUpdate,
    },
    config::ReconcilerConfig,
    models::{Role, UserConfig, UserState, UserStatus},
    schema::{UserChanges, validate_user},
};

/// Apply `changes` to an existing user, moving it towards `desired`.
///
/// The steps run in a fixed order: guards, status, profile, roles, groups,
/// password, recovery question. `state` is updated after every committed
/// step, so after a failure it still describes the remote user.
pub async fn update(
    client: &dyn DirectoryApi,
    desired: &UserConfig,
    changes: &UserChanges,
    state: &mut UserState,
    config: &ReconcilerConfig,
) -> ReconcileResult<()> {
    validate_user(desired)?;
    let user_id = state.id().ok_or(ReconcileError::NotCreated)?.to_string();

    if changes.status && desired.status == UserStatus::Staged {
        return Err(ReconcileError::StagedTransition);
    }

    if changes.password {
        let user = client.get_user(&user_id).await.step(Step::FetchUser)?;
        if user.status == UserStatus::Provisioned {
            return Err(ReconcileError::PasswordChangeWhileProvisioned);
        }
    }

    if changes.status {
        update_user_status(client, &user_id, desired.status, config).await?;
        state.raw_status = Some(desired.status);
        state.attributes.status = desired.status;
    }

    if desired.status == UserStatus::Deprovisioned && changes.touches_profile() {
        return Err(ReconcileError::DeprovisionedProfileChange);
    }

    if changes.requires_profile_update() {
        update_profile(client, &user_id, desired, changes, state).await?;
    }

    if changes.admin_roles
        && let Some(roles) = &desired.admin_roles
    {
        let delta = Delta::between(state.attributes.admin_roles.as_ref(), roles);
        if delta.is_empty() {
            state.attributes.admin_roles.get_or_insert_default();
        } else {
            update_roles(client, &user_id, &delta, state, config).await?;
        }
    }

    if changes.group_memberships
        && let Some(groups) = &desired.group_memberships
    {
        let delta = Delta::between(state.attributes.group_memberships.as_ref(), groups);
        let tracked = state.attributes.group_memberships.get_or_insert_default();

        for group_id in &delta.additions {
            client
                .add_user_to_group(group_id, &user_id)
                .await
                .step(Step::AddGroup)?;
            tracked.insert(group_id.clone());
        }
        for group_id in &delta.removals {
            client
                .remove_user_from_group(group_id, &user_id)
                .await
                .ok_if_not_found()
                .step(Step::RemoveGroup)?;
            tracked.remove(group_id);
        }
        debug!(
            user_id = %user_id,
            added = delta.additions.len(),
            removed = delta.removals.len(),
            "Reconciled group memberships"
        );
    }

    if changes.password
        && let Some(new_password) = &desired.password
    {
        match &desired.old_password {
            Some(old_password) => {
                let request = ChangePasswordRequest {
                    old_password: PasswordCredential::value(old_password.as_str()),
                    new_password: PasswordCredential::value(new_password.as_str()),
                };
                client
                    .change_password(&user_id, &request)
                    .await
                    .step(Step::ChangePassword)?;
            }
            None => {
                let update = UserUpdate {
                    profile: None,
                    credentials: Some(UserCredentials {
                        password: Some(PasswordCredential::value(new_password.as_str())),
                        recovery_question: None,
                    }),
                };
                client
                    .partial_update_user(&user_id, &update)
                    .await
                    .step(Step::SetPassword)?;
            }
        }
        state.attributes.password = desired.password.clone();
        state.attributes.old_password = desired.old_password.clone();
    }

    if changes.recovery() {
        let question = desired
            .recovery_question
            .clone()
            .or_else(|| state.attributes.recovery_question.clone());
        match question {
            Some(question) => {
                let password = desired
                    .password
                    .as_deref()
                    .or(state.attributes.password.as_deref())
                    .map(PasswordCredential::value);
                let credentials = UserCredentials {
                    password,
                    recovery_question: Some(RecoveryQuestionCredential {
                        question: question.clone(),
                        answer: desired.recovery_answer.clone(),
                    }),
                };
                client
                    .change_recovery_question(&user_id, &credentials)
                    .await
                    .step(Step::ChangeRecoveryQuestion)?;
                state.attributes.recovery_question = Some(question);
                if desired.recovery_answer.is_some() {
                    state.attributes.recovery_answer = desired.recovery_answer.clone();
                }
            }
            None => {
                warn!(user_id = %user_id, "Recovery answer changed without a recovery question, skipping");
            }
        }
    }

    state.attributes.skip_roles = desired.skip_roles;
    state.attributes.expire_password_on_create = desired.expire_password_on_create;

    info!(
        user_id = %user_id,
        changed = ?changes.changed_attributes(),
        "Updated user"
    );
    Ok(())
}

/// Remove and assign admin roles, resolving removals against the roles
/// currently assigned to the user directly.
async fn update_roles(
    client: &dyn DirectoryApi,
    user_id: &str,
    delta: &Delta,
    state: &mut UserState,
    config: &ReconcilerConfig,
) -> ReconcileResult<()> {
    let current: Vec<Role> = client
        .list_user_roles(user_id)
        .await
        .step(Step::ListRoles)?
        .into_iter()
        .filter(Role::is_user_assigned)
        .collect();
    let tracked = state.attributes.admin_roles.get_or_insert_default();

    for role in current
        .iter()
        .filter(|role| delta.removals.contains(&role.role_type))
    {
        let removed = client
            .remove_role(user_id, &role.id)
            .await
            .ok_if_not_found()
            .step(Step::RemoveRole)?;
        if removed.is_none() {
            debug!(user_id = %user_id, role = %role.role_type, "Role was already removed");
        }
        tracked.remove(&role.role_type);
    }
    for role_type in &delta.removals {
        tracked.remove(role_type);
    }

    for role_type in &delta.additions {
        if current.iter().any(|role| role.role_type == *role_type) {
            tracked.insert(role_type.clone());
            continue;
        }
        let request = AssignRoleRequest {
            role_type: role_type.clone(),
        };
        client
            .assign_role(user_id, &request, config.disable_role_notifications)
            .await
            .step(Step::AssignRole)?;
        debug!(user_id = %user_id, role = %role_type, "Assigned admin role");
        tracked.insert(role_type.clone());
    }
    Ok(())
}

/// Resubmit the full profile, with the credential that changed alongside.
async fn update_profile(
    client: &dyn DirectoryApi,
    user_id: &str,
    desired: &UserConfig,
    changes: &UserChanges,
    state: &mut UserState,
) -> ReconcileResult<()> {
    let custom = desired
        .custom_profile_attributes
        .clone()
        .or_else(|| state.attributes.custom_profile_attributes.clone());

    let hook = desired
        .password_inline_hook
        .as_deref()
        .filter(|hook| changes.password_inline_hook && !hook.is_empty())
        .map(PasswordCredential::hook);
    let hash = desired
        .password_hash
        .as_ref()
        .filter(|_| changes.password_hash)
        .map(PasswordCredential::hash);
    let credentials = hook.or(hash).map(|password| UserCredentials {
        password: Some(password),
        recovery_question: None,
    });

    let update = UserUpdate {
        profile: Some(payload::profile(&desired.profile, custom.as_ref())),
        credentials,
    };
    client
        .update_user(user_id, &update)
        .await
        .step(Step::UpdateProfile)?;

    state.attributes.profile = desired.profile.clone();
    state.attributes.custom_profile_attributes = custom;
    if changes.password_hash {
        state.attributes.password_hash = desired.password_hash.clone();
    }
    if changes.password_inline_hook {
        state.attributes.password_inline_hook = desired.password_inline_hook.clone();
    }
    Ok(())
}
