//! Fire-and-forget persistence of local edits to the external script
//! endpoint.
//!
//! Nothing here returns an error to the caller: delivery happens on a
//! detached task and failures are logged, never surfaced. The endpoint sends
//! no interpretable response and local state must not depend on it.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::pax::{PassengerRecord, RecordId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub webapp_url: Url,
    pub site_id: String,
    pub sheet_id: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    config: Option<Config>,
}

impl Client {
    /// A client without config is valid and drops every payload; the board
    /// works fine with write-back disabled.
    pub fn new(config: Option<Config>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn append(&self, record: &PassengerRecord) {
        if let Some(config) = &self.config {
            self.post_opaque(config, append_payload(config, record));
        }
    }

    pub fn update_by_uuid(&self, id: &RecordId, fields: Value) {
        if let Some(config) = &self.config {
            self.post_opaque(config, update_payload(config, id, fields));
        }
    }

    pub fn delete_by_uuid(&self, id: &RecordId) {
        if let Some(config) = &self.config {
            self.post_opaque(config, delete_payload(config, id));
        }
    }

    fn post_opaque(&self, config: &Config, body: Value) {
        let request = self.http.post(config.webapp_url.clone()).json(&body);
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!("write-back rejected: {}", response.status());
                }
                Ok(_) => debug!("write-back delivered"),
                Err(e) => warn!("write-back failed: {e}"),
            }
        });
    }
}

fn append_payload(config: &Config, record: &PassengerRecord) -> Value {
    json!({
        "action": "append",
        "sheetId": config.sheet_id,
        "siteId": config.site_id,
        "token": config.token,
        "passenger": {
            "uuid": record.id.as_str(),
            "createdAt": Local::now().to_rfc3339(),
            "paxId": record.pax_id.as_ref().map(|id| id.as_str()).unwrap_or(""),
            "lastName": record.last_name,
            "firstName": record.first_name,
            "flightNumber": record.flight_number,
            "departureTime": record.departure_time_text,
            "agentMarker": record.agent_marker,
            "assistance": record.assistance.as_code(),
            "isPriority": record.is_priority,
            "isAssisted": record.is_assisted,
        },
    })
}

fn update_payload(config: &Config, id: &RecordId, fields: Value) -> Value {
    json!({
        "action": "updateByUuid",
        "sheetId": config.sheet_id,
        "token": config.token,
        "uuid": id.as_str(),
        "fields": fields,
    })
}

fn delete_payload(config: &Config, id: &RecordId) -> Value {
    json!({
        "action": "deleteByUuid",
        "sheetId": config.sheet_id,
        "token": config.token,
        "uuid": id.as_str(),
    })
}
