use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Locally generated identifier of a tracked passenger. Stable for the
/// lifetime of the record in the roster and unique within it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        id.to_string().into()
    }
}

impl PartialEq<&str> for RecordId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Identifier correlating a record to the authoritative external source.
/// Manually created records carry none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PaxId(String);

impl PaxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PaxId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PaxId {
    fn from(id: &str) -> Self {
        id.to_string().into()
    }
}

impl PartialEq<&str> for PaxId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// SSR assistance codes carried by the source rows.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssistanceStatus {
    #[default]
    Wchr,
    Wchs,
    Wchc,
    Blind,
    Deaf,
    Dpna,
}

impl AssistanceStatus {
    /// Maps free-text source cells onto the known codes. Unknown or blank
    /// values fall back to the default, never to an error: one odd cell must
    /// not discard an otherwise valid row.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "WCHS" => Self::Wchs,
            "WCHC" => Self::Wchc,
            "BLIND" => Self::Blind,
            "DEAF" => Self::Deaf,
            "DPNA" => Self::Dpna,
            _ => Self::Wchr,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Wchr => "WCHR",
            Self::Wchs => "WCHS",
            Self::Wchc => "WCHC",
            Self::Blind => "BLIND",
            Self::Deaf => "DEAF",
            Self::Dpna => "DPNA",
        }
    }
}

/// One tracked passenger awaiting assistance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PassengerRecord {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pax_id: Option<PaxId>,
    pub last_name: String,
    pub first_name: String,
    pub flight_number: String,
    /// Raw departure time text from the source; format not guaranteed.
    /// Kept verbatim so urgency can always be recomputed from it.
    pub departure_time_text: String,
    #[serde(default)]
    pub assistance: AssistanceStatus,
    /// Raw agent-location text; blank means no agent is on the way.
    #[serde(default)]
    pub agent_marker: String,
    #[serde(default)]
    pub is_priority: bool,
    #[serde(default)]
    pub is_assisted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assisted_at_text: Option<String>,
    pub added_at_text: String,
}

impl PassengerRecord {
    pub fn agent_en_route(&self) -> bool {
        !self.agent_marker.trim().is_empty()
    }
}

/// Input fields for a manually created record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManualPassenger {
    pub last_name: String,
    #[serde(default)]
    pub first_name: String,
    pub flight_number: String,
    pub departure_time_text: String,
    #[serde(default)]
    pub assistance: AssistanceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistance_code_roundtrip() {
        for code in ["WCHR", "WCHS", "WCHC", "BLIND", "DEAF", "DPNA"] {
            assert_eq!(AssistanceStatus::from_code(code).as_code(), code);
        }
    }

    #[test]
    fn assistance_code_is_liberal() {
        assert_eq!(AssistanceStatus::from_code("wchs"), AssistanceStatus::Wchs);
        assert_eq!(AssistanceStatus::from_code(" wchc "), AssistanceStatus::Wchc);
        assert_eq!(AssistanceStatus::from_code(""), AssistanceStatus::Wchr);
        assert_eq!(AssistanceStatus::from_code("???"), AssistanceStatus::Wchr);
    }

    #[test]
    fn fresh_record_ids_are_unique() {
        let a = RecordId::fresh();
        let b = RecordId::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = PassengerRecord {
            id: "r-0".into(),
            pax_id: Some("P1".into()),
            last_name: "MULLER".into(),
            first_name: "Anna".into(),
            flight_number: "AF1234".into(),
            departure_time_text: "10:00".into(),
            assistance: AssistanceStatus::Wchs,
            agent_marker: String::new(),
            is_priority: false,
            is_assisted: false,
            assisted_at_text: None,
            added_at_text: "08:15".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["paxId"], "P1");
        assert_eq!(json["departureTimeText"], "10:00");
        assert_eq!(json["assistance"], "WCHS");
        assert!(json.get("assistedAtText").is_none());
    }
}
