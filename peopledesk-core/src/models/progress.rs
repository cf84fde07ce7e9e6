use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One row of the `checklist_progress` projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub completed: bool,
    pub note: Option<String>,
    pub verification: VerificationStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unverified" => Some(Self::Unverified),
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A partial edit. Absent fields are left alone; `note: null` clears the note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProgressInput {
    pub completed: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub note: Option<Option<String>>,
    pub verification: Option<VerificationStatus>,
}

/// Maps a present field (even `null`) to `Some`, leaving `None` for absent.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_distinguishes_absent_from_null() {
        let absent: UpdateProgressInput = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        assert_eq!(absent.note, None);

        let cleared: UpdateProgressInput = serde_json::from_str(r#"{"note":null}"#).unwrap();
        assert_eq!(cleared.note, Some(None));

        let set: UpdateProgressInput = serde_json::from_str(r#"{"note":"done"}"#).unwrap();
        assert_eq!(set.note, Some(Some("done".to_string())));
    }
}
