//! Read-only client for the spreadsheet-backed passenger source.
//!
//! The source exposes a tabular range over HTTP as a 2-D array of text
//! cells. Row validation happens here, at the boundary; everything past this
//! module works with typed [`SheetRow`]s.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::pax::{AssistanceStatus, PaxId};

pub const DEFAULT_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
pub const DEFAULT_RANGE: &str = "Jalons!A1:H5000";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
    pub sheet_id: String,
    #[serde(default = "default_range")]
    pub range: String,
    /// Without a key the source cannot be queried; refresh cycles are
    /// skipped with a warning rather than failing the board.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_endpoint() -> Url {
    Url::parse(DEFAULT_ENDPOINT).expect("default endpoint must be a valid URL")
}

fn default_range() -> String {
    DEFAULT_RANGE.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Config {
    pub fn new(sheet_id: impl Into<String>) -> Self {
        Self {
            endpoint: default_endpoint(),
            sheet_id: sheet_id.into(),
            range: default_range(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One validated row of the source range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow {
    pub pax_id: PaxId,
    pub last_name: String,
    pub first_name: String,
    pub flight_number: String,
    pub departure_time_text: String,
    pub agent_marker: String,
    pub assistance: AssistanceStatus,
    pub terminal: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response status: {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response body: {0}")]
    Malformed(#[source] reqwest::Error),
    #[error("invalid source URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("no API key configured for the source")]
    MissingApiKey,
}

/// The authoritative-rows collaborator, as a seam so the refresh path can be
/// exercised against a scripted source in tests.
#[async_trait]
pub trait PaxSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<HashMap<PaxId, SheetRow>, FetchError>;
}

pub struct Client {
    http: reqwest::Client,
    config: Config,
}

impl Client {
    pub fn new(config: Config) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn values_url(&self) -> Result<Url, FetchError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(FetchError::MissingApiKey)?;
        let mut url = self.config.endpoint.join(&format!(
            "{}/values/{}",
            self.config.sheet_id, self.config.range
        ))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }
}

#[async_trait]
impl PaxSource for Client {
    async fn fetch_rows(&self) -> Result<HashMap<PaxId, SheetRow>, FetchError> {
        let url = self.values_url()?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let range: ValueRange = response.json().await.map_err(FetchError::Malformed)?;
        Ok(parse_rows(&range.values))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Maps the raw 2-D cell array into rows keyed by external id.
///
/// Row 0 is a header and ignored. A row delivered as one semicolon-joined
/// cell is split before positional mapping. Rows with fewer than 6 cells or
/// missing a non-empty id or last name are discarded. On duplicate ids the
/// last row wins.
pub fn parse_rows(values: &[Vec<String>]) -> HashMap<PaxId, SheetRow> {
    let mut rows = HashMap::new();

    for raw in values.iter().skip(1) {
        let split;
        let cells: &[String] = if raw.len() == 1 && raw[0].contains(';') {
            split = raw[0]
                .split(';')
                .map(|cell| cell.trim().to_string())
                .collect::<Vec<_>>();
            &split
        } else {
            raw
        };

        if cells.len() < 6 {
            continue;
        }
        let cell = |index: usize| {
            cells
                .get(index)
                .map(|value| value.trim())
                .unwrap_or_default()
                .to_string()
        };

        let pax_id = cell(0);
        let last_name = cell(1);
        if pax_id.is_empty() || last_name.is_empty() {
            continue;
        }

        let terminal = cell(7);
        let row = SheetRow {
            pax_id: pax_id.into(),
            last_name,
            first_name: cell(2),
            flight_number: cell(3),
            departure_time_text: cell(4),
            agent_marker: cell(5),
            assistance: AssistanceStatus::from_code(&cell(6)),
            terminal: (!terminal.is_empty()).then_some(terminal),
        };
        rows.insert(row.pax_id.clone(), row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    #[test]
    fn header_row_is_ignored() {
        let values = vec![
            strings(&["paxId", "lastName", "firstName", "flight", "std", "agent"]),
            strings(&["P1", "MULLER", "Anna", "AF1234", "10:00", ""]),
        ];
        let rows = parse_rows(&values);
        assert_eq!(rows.len(), 1);
        assert!(rows.contains_key(&PaxId::from("P1")));
    }

    #[test]
    fn semicolon_joined_rows_are_split() {
        let values = vec![
            strings(&["header"]),
            strings(&["P1; MULLER ;Anna;AF1234; 10:00 ;AGENT7;WCHS;2A"]),
        ];
        let rows = parse_rows(&values);
        let row = &rows[&PaxId::from("P1")];
        assert_eq!(row.last_name, "MULLER");
        assert_eq!(row.departure_time_text, "10:00");
        assert_eq!(row.agent_marker, "AGENT7");
        assert_eq!(row.assistance, AssistanceStatus::Wchs);
        assert_eq!(row.terminal.as_deref(), Some("2A"));
    }

    #[test]
    fn incomplete_rows_are_discarded() {
        let values = vec![
            strings(&["header"]),
            // Too few cells.
            strings(&["P1", "MULLER", "Anna"]),
            // Missing external id.
            strings(&["", "MULLER", "Anna", "AF1234", "10:00", ""]),
            // Missing last name.
            strings(&["P2", " ", "Anna", "AF1234", "10:00", ""]),
            strings(&["P3", "FRANCO", "Luca", "AZ010", "11:15", "AGENT2"]),
        ];
        let rows = parse_rows(&values);
        assert_eq!(rows.len(), 1);
        assert!(rows.contains_key(&PaxId::from("P3")));
    }

    #[test]
    fn optional_columns_default() {
        let values = vec![
            strings(&["header"]),
            strings(&["P1", "MULLER", "Anna", "AF1234", "10:00", ""]),
        ];
        let row = &parse_rows(&values)[&PaxId::from("P1")];
        assert_eq!(row.assistance, AssistanceStatus::Wchr);
        assert_eq!(row.terminal, None);
        assert_eq!(row.agent_marker, "");
    }

    #[test]
    fn last_duplicate_wins() {
        let values = vec![
            strings(&["header"]),
            strings(&["P1", "MULLER", "Anna", "AF1234", "10:00", ""]),
            strings(&["P1", "MULLER", "Anna", "AF1234", "12:00", "AGENT7"]),
        ];
        let rows = parse_rows(&values);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[&PaxId::from("P1")].departure_time_text, "12:00");
    }

    #[test]
    fn empty_value_array_yields_no_rows() {
        assert!(parse_rows(&[]).is_empty());
    }

    #[test]
    fn url_requires_an_api_key() {
        let client = Client::new(Config::new("sheet-1")).unwrap();
        assert!(matches!(
            client.values_url(),
            Err(FetchError::MissingApiKey)
        ));

        let mut config = Config::new("sheet-1");
        config.api_key = Some("k".into());
        let client = Client::new(config).unwrap();
        let url = client.values_url().unwrap();
        assert!(url.as_str().starts_with(DEFAULT_ENDPOINT));
        assert!(url.as_str().contains("sheet-1/values/"));
        assert_eq!(url.query(), Some("key=k"));
    }
}
