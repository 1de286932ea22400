use crate::{EventId, GuildId, MemberId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Attendance can still be validated this long after an event's nominal end.
pub const GRACE_PERIOD_MINUTES: i64 = 30;

pub fn grace_period() -> Duration {
    Duration::minutes(GRACE_PERIOD_MINUTES)
}

// Event model
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub guild_id: GuildId,
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub dkp_reward: i64,
    /// Stored normalized (trimmed, upper-case).
    pub access_code: String,
    pub created_by: MemberId,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn status(&self, now: DateTime<Utc>) -> EventStatus {
        EventStatus::at(self.start_time, self.end_time, now)
    }

    /// `[start, end + grace]`, both ends inclusive.
    pub fn accepts_validation_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && now <= self.end_time + grace_period()
    }

    pub fn code_matches(&self, submitted: &str) -> bool {
        normalize_code(submitted) == self.access_code
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Finished,
}

impl EventStatus {
    /// Always derived from the clock, never stored.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            EventStatus::Upcoming
        } else if now < end {
            EventStatus::Ongoing
        } else {
            EventStatus::Finished
        }
    }
}

// Create event request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub dkp_reward: i64,
    /// Generated when absent.
    #[serde(default)]
    pub access_code: Option<String>,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

// Participation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    Interested,
    Confirmed,
    Attended,
}

impl ParticipationStatus {
    pub fn next(self) -> Option<Self> {
        match self {
            ParticipationStatus::Interested => Some(ParticipationStatus::Confirmed),
            ParticipationStatus::Confirmed => Some(ParticipationStatus::Attended),
            ParticipationStatus::Attended => None,
        }
    }

    /// Only the single step forward is allowed.
    pub fn can_advance_to(self, to: Self) -> bool {
        self.next() == Some(to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participation {
    pub event_id: EventId,
    pub member_id: MemberId,
    pub status: ParticipationStatus,
    pub dkp_earned: i64,
    pub signed_up_at: DateTime<Utc>,
    pub attended_at: Option<DateTime<Utc>>,
}

impl Participation {
    pub fn interested(event_id: EventId, member_id: MemberId, at: DateTime<Utc>) -> Self {
        Self {
            event_id,
            member_id,
            status: ParticipationStatus::Interested,
            dkp_earned: 0,
            signed_up_at: at,
            attended_at: None,
        }
    }
}
