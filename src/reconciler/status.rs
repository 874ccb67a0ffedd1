use tracing::{debug, info};

use super::{ReconcileError, ReconcileResult, Step, StepContext};
use crate::{client::DirectoryApi, config::ReconcilerConfig, models::UserStatus};

/// Collapse statuses the configuration cannot express onto the one it can.
///
/// A user with an expired password or in recovery is still active as far as
/// configuration is concerned.
pub fn map_status(status: UserStatus) -> UserStatus {
    match status {
        UserStatus::PasswordExpired | UserStatus::Recovery => UserStatus::Active,
        other => other,
    }
}

/// Move a user to `desired` and wait until the remote system reports the
/// transition as finished.
pub async fn update_user_status(
    client: &dyn DirectoryApi,
    user_id: &str,
    desired: UserStatus,
    config: &ReconcilerConfig,
) -> ReconcileResult<()> {
    let user = client.get_user(user_id).await.step(Step::FetchUser)?;
    let current = map_status(user.status);
    if current == desired {
        debug!(user_id = %user_id, status = %desired, "User already has the desired status");
        return Ok(());
    }

    let transition = match desired {
        UserStatus::Suspended => client.suspend_user(user_id).await,
        UserStatus::Deprovisioned => client.deactivate_user(user_id).await,
        UserStatus::Active if current == UserStatus::Suspended => {
            client.unsuspend_user(user_id).await
        }
        _ => client.activate_user(user_id, false).await,
    };
    transition.step(Step::TransitionStatus)?;

    info!(user_id = %user_id, from = %current, to = %desired, "User status transition requested");
    wait_for_transition(client, user_id, desired, config).await
}

async fn wait_for_transition(
    client: &dyn DirectoryApi,
    user_id: &str,
    target: UserStatus,
    config: &ReconcilerConfig,
) -> ReconcileResult<()> {
    for attempt in 1..=config.status_poll_attempts {
        let user = client.get_user(user_id).await.step(Step::FetchUser)?;
        match user.transitioning_to_status {
            None => return Ok(()),
            Some(pending) => {
                debug!(
                    user_id = %user_id,
                    pending = %pending,
                    attempt = attempt,
                    "User is still transitioning"
                );
                tokio::time::sleep(config.status_poll_interval()).await;
            }
        }
    }

    Err(ReconcileError::StatusTransitionTimeout {
        user_id: user_id.to_string(),
        target,
        attempts: config.status_poll_attempts,
    })
}
