use tracing::warn;

use super::{Plan, ReadOutcome, ReconcileResult, create, read, update};
use crate::{
    client::DirectoryApi,
    config::ReconcilerConfig,
    models::{UserConfig, UserState},
};

/// Plan and run the create or update that moves the user towards `desired`,
/// then refresh `state` from the remote user.
///
/// A recorded user that turns out to be gone is recreated once. `Gone` is
/// only returned when the user vanishes again straight after that.
pub async fn apply(
    client: &dyn DirectoryApi,
    desired: &UserConfig,
    state: &mut UserState,
    config: &ReconcilerConfig,
) -> ReconcileResult<ReadOutcome> {
    let mut recreated = false;
    loop {
        match Plan::for_user(state, desired) {
            Plan::Create => create(client, desired, state, config).await?,
            Plan::Update(changes) => update(client, desired, &changes, state, config).await?,
            Plan::NoChange => {}
        }

        match read(client, state).await? {
            ReadOutcome::Found => return Ok(ReadOutcome::Found),
            ReadOutcome::Gone if !recreated => {
                warn!(login = %desired.login(), "Recorded user no longer exists, recreating");
                recreated = true;
            }
            ReadOutcome::Gone => return Ok(ReadOutcome::Gone),
        }
    }
}
