//! Minimal actor plumbing: each actor exclusively owns its state, receives
//! messages over an mpsc channel, and replies through oneshot senders
//! embedded in the messages. A separate control channel carries shutdown.

#[cfg(feature = "rest")]
pub mod rest;
pub mod roster;

use tokio::sync::mpsc;
use tracing::error;

const MESSAGE_CHANNEL_SIZE: usize = 128;

#[derive(Debug)]
pub enum Control {
    Shutdown,
}

pub struct Handle<M> {
    message_sender: mpsc::Sender<M>,
    control_sender: mpsc::Sender<Control>,
}

// Derived Clone would require M: Clone.
impl<M> Clone for Handle<M> {
    fn clone(&self) -> Self {
        Self {
            message_sender: self.message_sender.clone(),
            control_sender: self.control_sender.clone(),
        }
    }
}

impl<M> Handle<M> {
    pub async fn send(&self, message: M) {
        if self.message_sender.send(message).await.is_err() {
            error!("actor channel closed, message dropped");
        }
    }

    pub async fn shutdown(&self) {
        if self.control_sender.send(Control::Shutdown).await.is_err() {
            error!("actor control channel closed");
        }
    }
}

pub struct State<M> {
    pub message_receiver: mpsc::Receiver<M>,
    pub control_receiver: mpsc::Receiver<Control>,
}

pub fn actor_channel<M>() -> (Handle<M>, State<M>) {
    let (message_sender, message_receiver) = mpsc::channel(MESSAGE_CHANNEL_SIZE);
    let (control_sender, control_receiver) = mpsc::channel(1);
    (
        Handle {
            message_sender,
            control_sender,
        },
        State {
            message_receiver,
            control_receiver,
        },
    )
}
