mod error;

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::{sync::oneshot, task::JoinHandle};
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info, warn};

pub use crate::actors::rest::error::Error;
use crate::{
    Status,
    actors::{Control, Handle, roster},
    board::{self, BoardEntry},
    pax::{ManualPassenger, PassengerRecord},
    stats::Summary,
};
use crate::actors::roster::message::{
    AddManualMessage, MarkAssistedMessage, Message, RemoveMessage, TogglePriorityMessage,
};

pub struct Actor {
    server_join_handle: JoinHandle<()>,
    shutdown_sender: oneshot::Sender<()>,
}

impl Actor {
    pub async fn run(self, mut state: crate::actors::State<()>) {
        loop {
            tokio::select! {
                Some(()) = state.message_receiver.recv() => {}
                Some(ctrl) = state.control_receiver.recv() => {
                    match ctrl {
                        Control::Shutdown => {
                            info!("Actor received shutdown control.");
                            break;
                        },
                    }
                }
                else => {
                    warn!("All channels closed, terminating actor.");
                    break;
                }
            }
        }

        self.shutdown().await;
    }
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct ServerState {
    roster_handle: Handle<Message>,
    site_id: String,
}

impl Actor {
    pub async fn new(
        config: &Config,
        site_id: String,
        roster_handle: Handle<Message>,
    ) -> Result<Self, Error> {
        let router = Router::new()
            .route("/passengers", get(list_passengers).post(add_passenger))
            .route("/passengers/{id}/priority", post(toggle_priority))
            .route("/passengers/{id}/assisted", post(mark_assisted))
            .route("/passengers/{id}", delete(remove_passenger))
            .route("/stats", get(stats))
            .route("/status", get(status))
            .layer(
                // Necessary for graceful shutdown
                TimeoutLayer::new(REQUEST_TIMEOUT),
            )
            .with_state(ServerState {
                roster_handle,
                site_id,
            });
        let listener = tokio::net::TcpListener::bind(config.addr)
            .await
            .map_err(|cause| Error::Bind {
                addr: config.addr,
                cause,
            })?;
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let server_join_handle = tokio::spawn(async move {
            info!(
                "starting REST server: {:?}",
                listener.local_addr().expect("local_addr never fails")
            );
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown_signal(shutdown_receiver).await })
                .await
                .expect("Never fails")
        });

        Ok(Self {
            server_join_handle,
            shutdown_sender,
        })
    }

    async fn shutdown(self) {
        // Send shutdown signal to the axum server
        self.shutdown_sender
            .send(())
            .expect("shutdown receiver must exist");
        // Wait until the axum server task is terminated
        self.server_join_handle
            .await
            .expect("REST server task must be terminated without error");
        info!("REST server has been shut down.");
    }
}

/// When this future resolves, the axum server starts graceful shutdown.
async fn shutdown_signal(shutdown_receiver: oneshot::Receiver<()>) {
    shutdown_receiver
        .await
        .expect("shutdown sender never be dropped");
    info!("starting graceful shutdown for REST server...");
}

async fn fetch_records(roster_handle: &Handle<Message>) -> Option<Vec<PassengerRecord>> {
    let (reply_sender, reply_receiver) = oneshot::channel();
    roster_handle.send(Message::List { reply_sender }).await;
    reply_receiver.await.ok()
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    /// Include records whose departure has already passed.
    #[serde(default)]
    all: bool,
}

async fn list_passengers(
    State(state): State<ServerState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<BoardEntry>>, StatusCode> {
    let Some(records) = fetch_records(&state.roster_handle).await else {
        error!("failed to read the roster");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };
    let now = Local::now().naive_local();
    Ok(Json(board::assemble(&records, now, params.all)))
}

async fn add_passenger(
    State(state): State<ServerState>,
    Json(passenger): Json<ManualPassenger>,
) -> impl IntoResponse {
    let (msg, reply_receiver) = AddManualMessage { passenger }.into();
    state.roster_handle.send(msg).await;
    match reply_receiver.await {
        Ok(record) => Ok((StatusCode::CREATED, Json(record))),
        Err(_) => {
            error!("failed to receive the add reply");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn toggle_priority(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (msg, reply_receiver) = TogglePriorityMessage { id: id.into() }.into();
    state.roster_handle.send(msg).await;
    mutation_response(reply_receiver.await)
}

async fn mark_assisted(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (msg, reply_receiver) = MarkAssistedMessage { id: id.into() }.into();
    state.roster_handle.send(msg).await;
    mutation_response(reply_receiver.await)
}

fn mutation_response(
    reply: Result<Result<PassengerRecord, roster::Error>, oneshot::error::RecvError>,
) -> Result<Json<PassengerRecord>, StatusCode> {
    match reply {
        Ok(Ok(record)) => Ok(Json(record)),
        Ok(Err(e)) => Err(error_status(&e)),
        Err(_) => {
            error!("failed to receive the mutation reply");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn remove_passenger(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (msg, reply_receiver) = RemoveMessage { id: id.into() }.into();
    state.roster_handle.send(msg).await;
    match reply_receiver.await {
        Ok(Ok(())) => Ok(StatusCode::NO_CONTENT),
        Ok(Err(e)) => Err(error_status(&e)),
        Err(_) => {
            error!("failed to receive the removal reply");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn error_status(error: &roster::Error) -> StatusCode {
    match error {
        roster::Error::NotFound { .. } => StatusCode::NOT_FOUND,
        roster::Error::DuplicateSelection { .. } => StatusCode::CONFLICT,
    }
}

async fn stats(State(state): State<ServerState>) -> Result<Json<Summary>, StatusCode> {
    let Some(records) = fetch_records(&state.roster_handle).await else {
        error!("failed to read the roster");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };
    let now = Local::now().naive_local();
    Ok(Json(Summary::compute(&records, now)))
}

async fn status(State(state): State<ServerState>) -> Result<Json<Status>, StatusCode> {
    let Some(records) = fetch_records(&state.roster_handle).await else {
        error!("failed to read the roster");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };
    Ok(Json(Status {
        site_id: state.site_id.clone(),
        passengers: records.len(),
        priority: records.iter().filter(|r| r.is_priority).count(),
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        }
    }
}
