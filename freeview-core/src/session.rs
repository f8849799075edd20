use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_SESSION: &str = "001";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("please enter a participant ID")]
    MissingParticipantId,
    #[error("please enter an email address")]
    MissingEmail,
}

/// Participant details collected at intake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub participant_id: String,
    pub email: String,
    pub session: String,
}

impl Participant {
    /// Trims every field. Id and email are required, a blank session
    /// falls back to [`DEFAULT_SESSION`].
    pub fn new(
        participant_id: &str,
        email: &str,
        session: &str,
    ) -> Result<Self, ValidationError> {
        let participant_id = participant_id.trim();
        let email = email.trim();
        let session = session.trim();

        if participant_id.is_empty() {
            return Err(ValidationError::MissingParticipantId);
        }
        if email.is_empty() {
            return Err(ValidationError::MissingEmail);
        }

        Ok(Self {
            participant_id: participant_id.to_string(),
            email: email.to_string(),
            session: if session.is_empty() {
                DEFAULT_SESSION.to_string()
            } else {
                session.to_string()
            },
        })
    }
}

/// `EXP_<YYYYMMDD>_p<participant>_s<session>`. Deterministic, so the same
/// participant and session on the same day always produce the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn compose(date: NaiveDate, participant: &Participant) -> Self {
        Self(format!(
            "EXP_{}_p{}_s{}",
            date.format("%Y%m%d"),
            participant.participant_id,
            participant.session
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Object-storage folder holding this session's artifacts
    pub fn folder(&self) -> String {
        format!("sessions/{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Completed,
    Partial,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Completed => "completed",
            SessionStatus::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub viewport: String,
    pub platform: String,
    pub experiment_duration_seconds: u64,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub participant_id: String,
    pub email: String,
    pub session_number: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub trials_completed: usize,
    pub trials_expected: usize,
    pub is_partial: bool,
    pub status: SessionStatus,
    pub metadata: SessionMetadata,
}

impl SessionRecord {
    pub fn new(
        participant: &Participant,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        trials_completed: usize,
        trials_expected: usize,
        metadata: SessionMetadata,
    ) -> Self {
        let is_partial = trials_completed < trials_expected;
        Self {
            session_id: SessionId::compose(completed_at.date_naive(), participant),
            participant_id: participant.participant_id.clone(),
            email: participant.email.clone(),
            session_number: participant.session.clone(),
            started_at,
            completed_at,
            trials_completed,
            trials_expected,
            is_partial,
            status: if is_partial {
                SessionStatus::Partial
            } else {
                SessionStatus::Completed
            },
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn participant() -> Participant {
        Participant::new(" 123 ", "p@example.org", "").unwrap()
    }

    #[test]
    fn intake_requires_id_and_email() {
        assert_eq!(
            Participant::new("  ", "a@b.c", "1"),
            Err(ValidationError::MissingParticipantId)
        );
        assert_eq!(
            Participant::new("7", "", "1"),
            Err(ValidationError::MissingEmail)
        );
        let p = participant();
        assert_eq!(p.participant_id, "123");
        assert_eq!(p.session, DEFAULT_SESSION);
    }

    #[test]
    fn session_id_is_date_participant_and_session() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let id = SessionId::compose(date, &participant());
        assert_eq!(id.as_str(), "EXP_20250309_p123_s001");
        assert_eq!(id.folder(), "sessions/EXP_20250309_p123_s001");
    }

    #[test]
    fn partial_when_fewer_trials_than_expected() {
        let start = Utc.with_ymd_and_hms(2025, 3, 9, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 9, 10, 5, 0).unwrap();
        let meta = SessionMetadata {
            viewport: "1920x1080".into(),
            platform: "linux".into(),
            experiment_duration_seconds: 300,
            cancelled: true,
        };
        let record = SessionRecord::new(&participant(), start, end, 7, 20, meta);
        assert!(record.is_partial);
        assert_eq!(record.trials_completed, 7);
        assert_eq!(record.status, SessionStatus::Partial);
        assert_eq!(record.session_id.as_str(), "EXP_20250309_p123_s001");
    }
}
