use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

#[cfg(feature = "rest")]
use crate::actors::rest;
use crate::{Error, actors::roster, sheet, writeback};

pub const DEFAULT_SITE_ID: &str = "CDG_T2A";

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REFRESH_INITIAL_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The desk this board runs for.
    #[serde(default = "default_site_id")]
    pub site_id: String,
    /// Per-site write-back sheet mapping. When empty, the source sheet
    /// doubles as the write-back target.
    #[serde(default)]
    pub sites: HashMap<String, String>,
    pub source: sheet::Config,
    #[serde(default)]
    pub writeback: Option<writeback::Config>,
    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,
    #[serde(default = "default_refresh_initial_delay", with = "humantime_serde")]
    pub refresh_initial_delay: Duration,
    #[serde(default)]
    pub roster: roster::Config,
    #[cfg(feature = "rest")]
    #[serde(default)]
    pub rest: rest::Config,
}

fn default_site_id() -> String {
    DEFAULT_SITE_ID.to_string()
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

fn default_refresh_initial_delay() -> Duration {
    DEFAULT_REFRESH_INITIAL_DELAY
}

impl Config {
    /// The sheet that write-backs for the current site land in.
    pub fn sheet_id_for_site(&self) -> Result<&str, Error> {
        if self.sites.is_empty() {
            return Ok(&self.source.sheet_id);
        }
        self.sites
            .get(&self.site_id)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::InvalidConfig(format!("no sheet mapped for site {:?}", self.site_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            site_id: DEFAULT_SITE_ID.to_string(),
            sites: HashMap::new(),
            source: sheet::Config::new("source-sheet"),
            writeback: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            refresh_initial_delay: DEFAULT_REFRESH_INITIAL_DELAY,
            roster: roster::Config::default(),
            #[cfg(feature = "rest")]
            rest: rest::Config::default(),
        }
    }

    #[test]
    fn without_a_mapping_the_source_sheet_is_used() {
        assert_eq!(config().sheet_id_for_site().unwrap(), "source-sheet");
    }

    #[test]
    fn mapped_sites_resolve_their_own_sheet() {
        let mut config = config();
        config
            .sites
            .insert(DEFAULT_SITE_ID.to_string(), "desk-sheet".to_string());
        assert_eq!(config.sheet_id_for_site().unwrap(), "desk-sheet");
    }

    #[test]
    fn unmapped_sites_are_rejected() {
        let mut config = config();
        config.sites.insert("P10".to_string(), "other".to_string());
        assert!(matches!(
            config.sheet_id_for_site(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn durations_parse_as_humantime() {
        let json = serde_json::json!({
            "source": { "sheet_id": "s" },
            "refresh_interval": "30s",
        });
        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.refresh_initial_delay, DEFAULT_REFRESH_INITIAL_DELAY);
        assert_eq!(config.site_id, DEFAULT_SITE_ID);
    }
}
