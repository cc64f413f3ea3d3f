use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};

use crate::{
    actors::roster::Error,
    pax::{ManualPassenger, PassengerRecord, PaxId, RecordId},
    reconcile::AgentChangeEvent,
    sheet::SheetRow,
};

pub enum Message {
    AddManual {
        msg: AddManualMessage,
        reply_sender: oneshot::Sender<PassengerRecord>,
    },
    AddSelected {
        msg: AddSelectedMessage,
        reply_sender: oneshot::Sender<Result<PassengerRecord, Error>>,
    },
    TogglePriority {
        msg: TogglePriorityMessage,
        reply_sender: oneshot::Sender<Result<PassengerRecord, Error>>,
    },
    MarkAssisted {
        msg: MarkAssistedMessage,
        reply_sender: oneshot::Sender<Result<PassengerRecord, Error>>,
    },
    /// Internal: fired by the timer scheduled on [`Message::MarkAssisted`].
    /// A no-op when the record has already left the roster.
    ExpireAssisted {
        id: RecordId,
    },
    Remove {
        msg: RemoveMessage,
        reply_sender: oneshot::Sender<Result<(), Error>>,
    },
    List {
        reply_sender: oneshot::Sender<Vec<PassengerRecord>>,
    },
    Count {
        reply_sender: oneshot::Sender<usize>,
    },
    Subscribe {
        reply_sender: oneshot::Sender<broadcast::Receiver<AgentChangeEvent>>,
    },
    ApplyRefresh {
        msg: ApplyRefreshMessage,
        reply_sender: oneshot::Sender<RefreshOutcome>,
    },
}

impl Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddManual { msg, .. } => f.debug_tuple("AddManual").field(msg).finish(),
            Self::AddSelected { msg, .. } => f.debug_tuple("AddSelected").field(msg).finish(),
            Self::TogglePriority { msg, .. } => {
                f.debug_tuple("TogglePriority").field(msg).finish()
            }
            Self::MarkAssisted { msg, .. } => f.debug_tuple("MarkAssisted").field(msg).finish(),
            Self::ExpireAssisted { id } => f.debug_tuple("ExpireAssisted").field(id).finish(),
            Self::Remove { msg, .. } => f.debug_tuple("Remove").field(msg).finish(),
            Self::List { .. } => f.debug_tuple("List").finish(),
            Self::Count { .. } => f.debug_tuple("Count").finish(),
            Self::Subscribe { .. } => f.debug_tuple("Subscribe").finish(),
            Self::ApplyRefresh { msg, .. } => f.debug_tuple("ApplyRefresh").field(msg).finish(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddManualMessage {
    pub passenger: ManualPassenger,
}

impl From<AddManualMessage> for (Message, oneshot::Receiver<PassengerRecord>) {
    fn from(msg: AddManualMessage) -> Self {
        let (reply_sender, reply_receiver) = oneshot::channel();
        (Message::AddManual { msg, reply_sender }, reply_receiver)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSelectedMessage {
    pub row: SheetRow,
}

impl From<AddSelectedMessage> for (Message, oneshot::Receiver<Result<PassengerRecord, Error>>) {
    fn from(msg: AddSelectedMessage) -> Self {
        let (reply_sender, reply_receiver) = oneshot::channel();
        (Message::AddSelected { msg, reply_sender }, reply_receiver)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TogglePriorityMessage {
    pub id: RecordId,
}

impl From<TogglePriorityMessage>
    for (Message, oneshot::Receiver<Result<PassengerRecord, Error>>)
{
    fn from(msg: TogglePriorityMessage) -> Self {
        let (reply_sender, reply_receiver) = oneshot::channel();
        (Message::TogglePriority { msg, reply_sender }, reply_receiver)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAssistedMessage {
    pub id: RecordId,
}

impl From<MarkAssistedMessage> for (Message, oneshot::Receiver<Result<PassengerRecord, Error>>) {
    fn from(msg: MarkAssistedMessage) -> Self {
        let (reply_sender, reply_receiver) = oneshot::channel();
        (Message::MarkAssisted { msg, reply_sender }, reply_receiver)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveMessage {
    pub id: RecordId,
}

impl From<RemoveMessage> for (Message, oneshot::Receiver<Result<(), Error>>) {
    fn from(msg: RemoveMessage) -> Self {
        let (reply_sender, reply_receiver) = oneshot::channel();
        (Message::Remove { msg, reply_sender }, reply_receiver)
    }
}

#[derive(Debug, Clone)]
pub struct ApplyRefreshMessage {
    pub rows: HashMap<PaxId, SheetRow>,
}

impl From<ApplyRefreshMessage> for (Message, oneshot::Receiver<RefreshOutcome>) {
    fn from(msg: ApplyRefreshMessage) -> Self {
        let (reply_sender, reply_receiver) = oneshot::channel();
        (Message::ApplyRefresh { msg, reply_sender }, reply_receiver)
    }
}

/// What a refresh cycle did to the roster.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    /// Source rows offered to the merge.
    pub rows: usize,
    /// Local records with at least one field delta.
    pub changed: usize,
    /// Agent-status change events broadcast.
    pub events: usize,
}
