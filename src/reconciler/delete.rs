use tracing::info;

use super::{ReconcileError, ReconcileResult, Step, StepContext};
use crate::{
    client::DirectoryApi,
    models::{UserState, UserStatus},
};

/// Deprovision and delete a user.
///
/// The remote delete call deactivates a live user and only deletes one that
/// is already deprovisioned, so a user recorded as DEPROVISIONED takes one
/// call and any other takes two.
pub async fn delete(client: &dyn DirectoryApi, state: &mut UserState) -> ReconcileResult<()> {
    let user_id = state.id().ok_or(ReconcileError::NotCreated)?.to_string();
    let passes = if state.attributes.status == UserStatus::Deprovisioned {
        1
    } else {
        2
    };

    for _ in 0..passes {
        client
            .deactivate_or_delete_user(&user_id)
            .await
            .step(Step::DeleteUser)?;
    }

    info!(user_id = %user_id, calls = passes, "Deleted user");
    state.clear_id();
    Ok(())
}
