use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, error, info, warn};

#[cfg(feature = "rest")]
use crate::actors::rest;
use crate::{
    actors::{actor_channel, roster},
    pax::{PassengerRecord, PaxId},
    periodic_refresh::handle_refresh_tick,
    sheet::PaxSource as _,
};
#[cfg(feature = "rest")]
pub use crate::actors::rest::Config as RestConfig;
pub use crate::actors::{
    Handle,
    roster::{Config as RosterConfig, message as roster_message},
};
pub use crate::config::Config;

mod actors;
pub mod board;
pub mod config;
pub mod pax;
pub mod periodic_refresh;
pub mod reconcile;
pub mod sheet;
pub mod stats;
pub mod timetext;
pub mod urgency;
pub mod writeback;

pub struct Paxtrack {
    config: Config,
    command_receiver: mpsc::Receiver<Command>,
}

impl Paxtrack {
    pub fn new(config: Config) -> Result<(Self, mpsc::Sender<Command>), Error> {
        let (command_sender, command_receiver) = mpsc::channel(100);
        Ok((
            Self {
                config,
                command_receiver,
            },
            command_sender,
        ))
    }

    pub async fn run(mut self, ready_sender: oneshot::Sender<Result<(), Error>>) {
        info!("Paxtrack is running...");

        let source = match sheet::Client::new(self.config.source.clone()) {
            Ok(source) => source,
            Err(e) => {
                error!("Failed to create source client: {e:?}");
                ready_sender
                    .send(Err(e.into()))
                    .expect("Failed to send ready signal");
                return;
            }
        };

        let writeback = writeback::Client::new(self.config.writeback.clone());

        let (roster_handle, roster_state) = actor_channel();
        let roster_actor =
            roster::Actor::new(self.config.roster.clone(), writeback, roster_handle.clone());
        let mut join_handles: Vec<JoinHandle<()>> =
            vec![tokio::spawn(roster_actor.run(roster_state))];

        #[cfg(feature = "rest")]
        let rest_handle = {
            let (rest_handle, rest_state) = actor_channel();
            let rest_actor = match rest::Actor::new(
                &self.config.rest,
                self.config.site_id.clone(),
                roster_handle.clone(),
            )
            .await
            {
                Ok(actor) => actor,
                Err(e) => {
                    error!("Failed to create REST actor: {e:?}");
                    ready_sender
                        .send(Err(e.into()))
                        .expect("Failed to send ready signal");
                    return;
                }
            };
            join_handles.push(tokio::spawn(rest_actor.run(rest_state)));
            rest_handle
        };

        ready_sender
            .send(Ok(()))
            .expect("Failed to send ready signal");

        let mut refresh_interval = interval_at(
            Instant::now() + self.config.refresh_initial_delay,
            self.config.refresh_interval,
        );
        refresh_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(cmd) = self.command_receiver.recv() => {
                    debug!("Command received: {:?}", cmd);
                    if handle_command(cmd, &source, &roster_handle, &self.config).await {
                        break;
                    }
                }
                _ = refresh_interval.tick() => {
                    // Ticks are handled one at a time in this loop; a cycle
                    // never starts while the previous one is in flight.
                    run_refresh_cycle(&source, &roster_handle).await;
                }
            }
        }

        roster_handle.shutdown().await;
        #[cfg(feature = "rest")]
        rest_handle.shutdown().await;
        for join_handle in join_handles {
            if let Err(e) = join_handle.await {
                error!("Failed to wait for an actor to terminate: {e}");
            }
        }
        info!("Paxtrack has been terminated.");
    }
}

/// Returns true when the runtime should shut down.
async fn handle_command(
    command: Command,
    source: &sheet::Client,
    roster_handle: &Handle<roster::message::Message>,
    config: &Config,
) -> bool {
    match command {
        Command::Roster(msg) => roster_handle.send(msg).await,
        Command::AddSelected {
            pax_id,
            reply_sender,
        } => {
            handle_add_selected_command(pax_id, reply_sender, source, roster_handle).await;
        }
        Command::Refresh { reply_sender } => {
            let result = handle_refresh_tick(source, roster_handle).await;
            let _ = reply_sender
                .send(result)
                .inspect_err(|_| error!("Failed to send refresh reply"));
        }
        Command::Status { reply_sender } => {
            handle_status_command(reply_sender, roster_handle, config).await;
        }
        Command::Shutdown => {
            return true;
        }
    }

    false
}

async fn handle_add_selected_command(
    pax_id: PaxId,
    reply_sender: oneshot::Sender<Result<PassengerRecord, Error>>,
    source: &sheet::Client,
    roster_handle: &Handle<roster::message::Message>,
) {
    let mut rows = match source.fetch_rows().await {
        Ok(rows) => rows,
        Err(e) => {
            let _ = reply_sender
                .send(Err(e.into()))
                .inspect_err(|_| error!("Failed to send selection reply"));
            return;
        }
    };
    let Some(row) = rows.remove(&pax_id) else {
        let _ = reply_sender
            .send(Err(Error::UnknownPax { pax_id }))
            .inspect_err(|_| error!("Failed to send selection reply"));
        return;
    };

    let (msg, reply_receiver) = roster::message::AddSelectedMessage { row }.into();
    roster_handle.send(msg).await;
    let result = match reply_receiver.await {
        Ok(result) => result.map_err(Error::Roster),
        Err(_) => {
            error!("Failed to receive selection reply from the roster");
            return;
        }
    };
    let _ = reply_sender
        .send(result)
        .inspect_err(|_| error!("Failed to send selection reply"));
}

async fn handle_status_command(
    reply_sender: oneshot::Sender<Status>,
    roster_handle: &Handle<roster::message::Message>,
    config: &Config,
) {
    let (list_sender, list_receiver) = oneshot::channel();
    roster_handle
        .send(roster::message::Message::List {
            reply_sender: list_sender,
        })
        .await;

    let Ok(records) = list_receiver.await else {
        error!("Failed to receive the roster");
        return;
    };

    let status = Status {
        site_id: config.site_id.clone(),
        passengers: records.len(),
        priority: records.iter().filter(|r| r.is_priority).count(),
    };
    let _ = reply_sender
        .send(status)
        .inspect_err(|_| error!("Failed to send status reply"));
}

async fn run_refresh_cycle(
    source: &sheet::Client,
    roster_handle: &Handle<roster::message::Message>,
) {
    match handle_refresh_tick(source, roster_handle).await {
        Ok(outcome) if outcome.changed > 0 => {
            debug!("Refresh cycle done: {outcome:?}");
        }
        Ok(_) => {}
        Err(sheet::FetchError::MissingApiKey) => {
            warn!("Refresh skipped: no API key configured for the source");
        }
        Err(e) => {
            // The roster stays as it was; the next cycle runs normally.
            error!("Refresh cycle failed: {e}");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Source error: {0}")]
    Fetch(#[from] sheet::FetchError),
    #[error("Roster error: {0}")]
    Roster(#[from] roster::Error),
    #[cfg(feature = "rest")]
    #[error("REST error: {0}")]
    Rest(#[from] rest::Error),
    #[error("Unknown passenger in the source: {pax_id:?}")]
    UnknownPax { pax_id: PaxId },
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug)]
pub enum Command {
    Roster(roster::message::Message),
    /// Track a passenger surfaced by the external source.
    AddSelected {
        pax_id: PaxId,
        reply_sender: oneshot::Sender<Result<PassengerRecord, Error>>,
    },
    /// Run a refresh cycle now, outside the periodic schedule.
    Refresh {
        reply_sender:
            oneshot::Sender<Result<roster::message::RefreshOutcome, sheet::FetchError>>,
    },
    Status {
        reply_sender: oneshot::Sender<Status>,
    },
    Shutdown,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    pub site_id: String,
    pub passengers: usize,
    pub priority: usize,
}
