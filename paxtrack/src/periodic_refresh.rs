use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::{
    actors::{
        Handle,
        roster::message::{ApplyRefreshMessage, Message, RefreshOutcome},
    },
    sheet::{FetchError, PaxSource},
};

/// One refresh cycle: fetch the authoritative rows and hand them to the
/// roster actor for merging.
///
/// An empty roster skips the fetch entirely; there is nobody to update and
/// no reason to hit the network. The merge runs inside the roster actor, so
/// it operates on the roster as it stands when the fetch resolves, not on a
/// snapshot taken before it started. A failed fetch leaves the roster
/// untouched; the caller logs it and the next cycle proceeds normally.
pub async fn handle_refresh_tick<S>(
    source: &S,
    roster_handle: &Handle<Message>,
) -> Result<RefreshOutcome, FetchError>
where
    S: PaxSource,
{
    let (reply_sender, reply_receiver) = oneshot::channel();
    roster_handle.send(Message::Count { reply_sender }).await;
    let count = reply_receiver.await.expect("roster actor must exist");
    if count == 0 {
        debug!("Roster is empty, skipping refresh");
        return Ok(RefreshOutcome::default());
    }

    let rows = source.fetch_rows().await?;

    let (msg, reply_receiver) = ApplyRefreshMessage { rows }.into();
    roster_handle.send(msg).await;
    let outcome = reply_receiver.await.expect("roster actor must exist");
    if outcome.changed > 0 {
        info!(
            "Refresh applied: {} of {} rows changed local records, {} agent events",
            outcome.changed, outcome.rows, outcome.events
        );
    }
    Ok(outcome)
}
