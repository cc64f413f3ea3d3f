pub mod message;

use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::{
    actors::{Control, Handle, State},
    pax::{PassengerRecord, RecordId},
    reconcile::{self, AgentChangeEvent},
    writeback,
};
use message::{
    AddManualMessage, AddSelectedMessage, ApplyRefreshMessage, MarkAssistedMessage, Message,
    RefreshOutcome, RemoveMessage, TogglePriorityMessage,
};

const EVENT_CHANNEL_SIZE: usize = 128;

const DEFAULT_ASSISTED_LINGER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long an assisted record stays on the board before its scheduled
    /// removal.
    #[serde(default = "default_assisted_linger", with = "humantime_serde")]
    pub assisted_linger: Duration,
}

fn default_assisted_linger() -> Duration {
    DEFAULT_ASSISTED_LINGER
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assisted_linger: DEFAULT_ASSISTED_LINGER,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("no passenger with id {id:?}")]
    NotFound { id: RecordId },
    #[error("passenger {pax_id} is already tracked")]
    DuplicateSelection { pax_id: String },
}

/// Exclusive owner of the local passenger roster. Every mutation and read
/// goes through its message channel, so the merge of a refresh cycle always
/// sees the roster as it is at merge time, after any user edits that
/// interleaved with the fetch.
pub struct Actor {
    config: Config,
    records: Vec<PassengerRecord>,
    writeback: writeback::Client,
    event_sender: broadcast::Sender<AgentChangeEvent>,
    /// Used by the assisted-expiry timers to message the actor back.
    self_handle: Handle<Message>,
}

impl Actor {
    pub fn new(
        config: Config,
        writeback: writeback::Client,
        self_handle: Handle<Message>,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            config,
            records: Vec::new(),
            writeback,
            event_sender,
            self_handle,
        }
    }

    pub async fn run(mut self, mut state: State<Message>) {
        loop {
            tokio::select! {
                Some(message) = state.message_receiver.recv() => {
                    self.handle_message(message)
                }
                Some(ctrl) = state.control_receiver.recv() => {
                    match ctrl {
                        Control::Shutdown => {
                            info!("Actor received shutdown control.");
                            return;
                        },
                    }
                }
                else => {
                    warn!("All channels closed, terminating actor.");
                    return;
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::AddManual { msg, reply_sender } => self.handle_add_manual(msg, reply_sender),
            Message::AddSelected { msg, reply_sender } => {
                self.handle_add_selected(msg, reply_sender)
            }
            Message::TogglePriority { msg, reply_sender } => {
                self.handle_toggle_priority(msg, reply_sender)
            }
            Message::MarkAssisted { msg, reply_sender } => {
                self.handle_mark_assisted(msg, reply_sender)
            }
            Message::ExpireAssisted { id } => self.handle_expire_assisted(id),
            Message::Remove { msg, reply_sender } => self.handle_remove(msg, reply_sender),
            Message::List { reply_sender } => {
                let _ = reply_sender.send(self.records.clone());
            }
            Message::Count { reply_sender } => {
                let _ = reply_sender.send(self.records.len());
            }
            Message::Subscribe { reply_sender } => {
                let _ = reply_sender.send(self.event_sender.subscribe());
            }
            Message::ApplyRefresh { msg, reply_sender } => {
                self.handle_apply_refresh(msg, reply_sender)
            }
        }
    }

    fn handle_add_manual(
        &mut self,
        AddManualMessage { passenger }: AddManualMessage,
        reply_sender: oneshot::Sender<PassengerRecord>,
    ) {
        let record = self.track(PassengerRecord {
            id: RecordId::fresh(),
            pax_id: None,
            last_name: passenger.last_name,
            first_name: passenger.first_name,
            flight_number: passenger.flight_number,
            departure_time_text: passenger.departure_time_text,
            assistance: passenger.assistance,
            agent_marker: String::new(),
            is_priority: false,
            is_assisted: false,
            assisted_at_text: None,
            added_at_text: now_hhmm(),
        });
        info!(
            "Added manual passenger {} ({})",
            record.last_name,
            record.id.as_str()
        );
        let _ = reply_sender.send(record);
    }

    fn handle_add_selected(
        &mut self,
        AddSelectedMessage { row }: AddSelectedMessage,
        reply_sender: oneshot::Sender<Result<PassengerRecord, Error>>,
    ) {
        if self
            .records
            .iter()
            .any(|record| record.pax_id.as_ref() == Some(&row.pax_id))
        {
            warn!("Passenger {} already tracked, ignoring", row.pax_id.as_str());
            let _ = reply_sender.send(Err(Error::DuplicateSelection {
                pax_id: row.pax_id.as_str().to_string(),
            }));
            return;
        }

        // The source may already have dispatched an agent for this
        // passenger; carry the marker so the board shows it from the start.
        let record = self.track(PassengerRecord {
            id: RecordId::fresh(),
            pax_id: Some(row.pax_id),
            last_name: row.last_name,
            first_name: row.first_name,
            flight_number: row.flight_number,
            departure_time_text: row.departure_time_text,
            assistance: row.assistance,
            agent_marker: row.agent_marker,
            is_priority: false,
            is_assisted: false,
            assisted_at_text: None,
            added_at_text: now_hhmm(),
        });
        info!(
            "Added selected passenger {} ({})",
            record.last_name,
            record.id.as_str()
        );
        let _ = reply_sender.send(Ok(record));
    }

    fn track(&mut self, record: PassengerRecord) -> PassengerRecord {
        self.records.push(record.clone());
        self.writeback.append(&record);
        record
    }

    fn handle_toggle_priority(
        &mut self,
        TogglePriorityMessage { id }: TogglePriorityMessage,
        reply_sender: oneshot::Sender<Result<PassengerRecord, Error>>,
    ) {
        let result = match self.records.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.is_priority = !record.is_priority;
                self.writeback
                    .update_by_uuid(&id, json!({ "isPriority": record.is_priority }));
                Ok(record.clone())
            }
            None => Err(Error::NotFound { id }),
        };
        let _ = reply_sender.send(result);
    }

    fn handle_mark_assisted(
        &mut self,
        MarkAssistedMessage { id }: MarkAssistedMessage,
        reply_sender: oneshot::Sender<Result<PassengerRecord, Error>>,
    ) {
        let mut to_schedule: Option<RecordId> = None;
        let result = match self.records.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                if !record.is_assisted {
                    record.is_assisted = true;
                    record.assisted_at_text = Some(now_hhmm());
                    self.writeback.update_by_uuid(
                        &id,
                        json!({
                            "isAssisted": true,
                            "assistedAt": record.assisted_at_text,
                        }),
                    );
                    to_schedule = Some(id.clone());
                }
                Ok(record.clone())
            }
            None => Err(Error::NotFound { id }),
        };
        if let Some(id) = to_schedule {
            self.schedule_assisted_expiry(id);
        }
        let _ = reply_sender.send(result);
    }

    fn schedule_assisted_expiry(&self, id: RecordId) {
        let handle = self.self_handle.clone();
        let linger = self.config.assisted_linger;
        tokio::spawn(async move {
            tokio::time::sleep(linger).await;
            handle.send(Message::ExpireAssisted { id }).await;
        });
    }

    fn handle_expire_assisted(&mut self, id: RecordId) {
        let position = self
            .records
            .iter()
            .position(|record| record.id == id && record.is_assisted);
        match position {
            Some(position) => {
                let record = self.records.remove(position);
                // Local removal only: the assisted row stays in the sheet
                // for the statistics views.
                info!(
                    "Assisted passenger {} left the board",
                    record.last_name
                );
            }
            None => debug!("Assisted expiry for {id:?} skipped, record already gone"),
        }
    }

    fn handle_remove(
        &mut self,
        RemoveMessage { id }: RemoveMessage,
        reply_sender: oneshot::Sender<Result<(), Error>>,
    ) {
        let result = match self.records.iter().position(|record| record.id == id) {
            Some(position) => {
                let record = self.records.remove(position);
                self.writeback.delete_by_uuid(&record.id);
                info!("Removed passenger {} ({})", record.last_name, id.as_str());
                Ok(())
            }
            None => Err(Error::NotFound { id }),
        };
        let _ = reply_sender.send(result);
    }

    fn handle_apply_refresh(
        &mut self,
        ApplyRefreshMessage { rows }: ApplyRefreshMessage,
        reply_sender: oneshot::Sender<RefreshOutcome>,
    ) {
        let outcome = reconcile::reconcile(&self.records, &rows);
        self.records = outcome.records;
        for event in &outcome.events {
            // Send fails only without subscribers, which is fine.
            let _ = self.event_sender.send(event.clone());
        }
        let _ = reply_sender.send(RefreshOutcome {
            rows: rows.len(),
            changed: outcome.changed,
            events: outcome.events.len(),
        });
    }
}

fn now_hhmm() -> String {
    Local::now().format("%H:%M").to_string()
}
