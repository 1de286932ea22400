/// Event lifecycle: create, read, delete.
/// Participation records hang off each event entry and go away with it.
// region:    --- Imports
use super::model::{normalize_code, Event, EventStatus, NewEvent, Participation, ParticipationStatus};
use crate::clock::Clock;
use crate::error::{EconomyError, Result};
use crate::guild::{is_owner, require_owner, GuildDirectory};
use crate::ledger::MAX_AMOUNT;
use crate::{EventId, GuildId, MemberId};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::info;
// endregion: --- Imports

const GENERATED_CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_NAME_LEN: usize = 100;

// region:    --- Entries
/// One record per (event, member); its mutex is the single writer for that key.
pub(crate) type ParticipationSlot = Arc<Mutex<Participation>>;

pub(crate) struct EventEntry {
    pub event: Event,
    pub participants: RwLock<HashMap<MemberId, ParticipationSlot>>,
    /// Set under the participants write lock. Writers re-check it after locking.
    deleted: AtomicBool,
}

impl EventEntry {
    fn new(event: Event) -> Self {
        Self {
            event,
            participants: RwLock::new(HashMap::new()),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    /// `EventNotFound` once the event is gone.
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_deleted() {
            Err(EconomyError::EventNotFound(self.event.id))
        } else {
            Ok(())
        }
    }

    pub fn slot(&self, member: MemberId) -> Option<ParticipationSlot> {
        let participants = self.participants.read().unwrap_or_else(|e| e.into_inner());
        participants.get(&member).cloned()
    }

    fn slots(&self) -> Vec<ParticipationSlot> {
        let participants = self.participants.read().unwrap_or_else(|e| e.into_inner());
        participants.values().cloned().collect()
    }
}
// endregion: --- Entries

// region:    --- Read Model
#[derive(Debug, Clone, Serialize)]
pub struct UserParticipation {
    pub status: ParticipationStatus,
    pub dkp_earned: i64,
    pub attended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub id: EventId,
    pub guild_id: GuildId,
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub dkp_reward: i64,
    pub created_by: MemberId,
    pub created_at: DateTime<Utc>,
    pub status: EventStatus,
    pub participant_count: usize,
    pub confirmed_count: usize,
    pub attended_count: usize,
    pub user_participation: Option<UserParticipation>,
    /// Owner only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
}
// endregion: --- Read Model

// region:    --- Event Registry
pub struct EventRegistry {
    events: RwLock<HashMap<EventId, Arc<EventEntry>>>,
    next_id: AtomicI64,
    directory: Arc<dyn GuildDirectory>,
    clock: Arc<dyn Clock>,
}

impl EventRegistry {
    pub fn new(directory: Arc<dyn GuildDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            directory,
            clock,
        }
    }

    /// Owner-only. Generates an access code when none is supplied.
    pub async fn create(&self, owner: MemberId, guild: GuildId, fields: NewEvent) -> Result<Event> {
        require_owner(self.directory.as_ref(), guild, owner).await?;

        let name = fields.name.trim().to_string();
        if name.is_empty() {
            return Err(EconomyError::InvalidField {
                field: "name",
                reason: "must not be empty",
            });
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(EconomyError::InvalidField {
                field: "name",
                reason: "must be at most 100 characters",
            });
        }
        if fields.end_time <= fields.start_time {
            return Err(EconomyError::InvalidRange);
        }
        if fields.dkp_reward < 1 {
            return Err(EconomyError::InvalidField {
                field: "dkp_reward",
                reason: "must be a positive integer",
            });
        }
        if fields.dkp_reward > MAX_AMOUNT {
            return Err(EconomyError::InvalidField {
                field: "dkp_reward",
                reason: "is too large",
            });
        }
        let supplied_code = match fields.access_code.as_deref().map(normalize_code) {
            Some(code) if code.is_empty() => None,
            Some(code) => {
                if !(4..=12).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(EconomyError::InvalidField {
                        field: "access_code",
                        reason: "must be 4 to 12 letters or digits",
                    });
                }
                Some(code)
            }
            None => None,
        };

        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        let access_code = supplied_code.unwrap_or_else(|| generate_unique_code(&events));
        let event = Event {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            guild_id: guild,
            name,
            description: fields.description.unwrap_or_default(),
            start_time: fields.start_time,
            end_time: fields.end_time,
            dkp_reward: fields.dkp_reward,
            access_code,
            created_by: owner,
            created_at: self.clock.now(),
        };
        events.insert(
            event.id,
            Arc::new(EventEntry::new(event.clone())),
        );

        info!(
            "{:<12} --> created event id={} guild={} reward={}",
            "Events", event.id, guild, event.dkp_reward
        );
        Ok(event)
    }

    pub fn status(&self, event: &Event) -> EventStatus {
        event.status(self.clock.now())
    }

    pub fn get(&self, id: EventId) -> Result<Event> {
        Ok(self.entry(id)?.event.clone())
    }

    /// Owner-only. Drops every participation record of the event and waits for
    /// writers already holding a record lock; they see the event as gone.
    pub async fn delete(&self, id: EventId, requester: MemberId) -> Result<()> {
        let guild = self.entry(id)?.event.guild_id;
        require_owner(self.directory.as_ref(), guild, requester).await?;

        let removed = {
            let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
            events.remove(&id)
        };
        let entry = removed.ok_or(EconomyError::EventNotFound(id))?;
        let slots = {
            let participants = entry.participants.write().unwrap_or_else(|e| e.into_inner());
            entry.deleted.store(true, Ordering::SeqCst);
            participants.values().cloned().collect::<Vec<_>>()
        };
        for slot in &slots {
            drop(slot.lock().await);
        }
        let dropped = slots.len();
        info!(
            "{:<12} --> deleted event id={} (participations dropped: {})",
            "Events", id, dropped
        );
        Ok(())
    }

    pub async fn summary(&self, id: EventId, viewer: MemberId) -> Result<EventSummary> {
        let entry = self.entry(id)?;
        let viewer_is_owner = is_owner(self.directory.as_ref(), entry.event.guild_id, viewer).await;
        Ok(self.summarize(&entry, viewer, viewer_is_owner).await)
    }

    /// Events of a guild ordered by start time.
    pub async fn list(&self, guild: GuildId, viewer: MemberId) -> Vec<EventSummary> {
        let mut entries: Vec<Arc<EventEntry>> = {
            let events = self.events.read().unwrap_or_else(|e| e.into_inner());
            events
                .values()
                .filter(|entry| entry.event.guild_id == guild)
                .cloned()
                .collect()
        };
        entries.sort_by_key(|entry| (entry.event.start_time, entry.event.id));

        let viewer_is_owner = is_owner(self.directory.as_ref(), guild, viewer).await;
        let mut summaries = Vec::with_capacity(entries.len());
        for entry in &entries {
            summaries.push(self.summarize(entry, viewer, viewer_is_owner).await);
        }
        summaries
    }

    pub(crate) fn entry(&self, id: EventId) -> Result<Arc<EventEntry>> {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        events.get(&id).cloned().ok_or(EconomyError::EventNotFound(id))
    }

    async fn summarize(&self, entry: &EventEntry, viewer: MemberId, viewer_is_owner: bool) -> EventSummary {
        let mut confirmed_count = 0;
        let mut attended_count = 0;
        let mut user_participation = None;
        let slots = entry.slots();
        for slot in &slots {
            let participation = slot.lock().await;
            match participation.status {
                ParticipationStatus::Interested => {}
                ParticipationStatus::Confirmed => confirmed_count += 1,
                ParticipationStatus::Attended => attended_count += 1,
            }
            if participation.member_id == viewer {
                user_participation = Some(UserParticipation {
                    status: participation.status,
                    dkp_earned: participation.dkp_earned,
                    attended_at: participation.attended_at,
                });
            }
        }

        let event = &entry.event;
        EventSummary {
            id: event.id,
            guild_id: event.guild_id,
            name: event.name.clone(),
            description: event.description.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            dkp_reward: event.dkp_reward,
            created_by: event.created_by,
            created_at: event.created_at,
            status: self.status(event),
            participant_count: slots.len(),
            confirmed_count,
            attended_count,
            user_participation,
            access_code: viewer_is_owner.then(|| event.access_code.clone()),
        }
    }
}
// endregion: --- Event Registry

/// Random `[A-Z0-9]{6}` not used by any live event.
fn generate_unique_code(events: &HashMap<EventId, Arc<EventEntry>>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let code: String = (0..GENERATED_CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        if !events.values().any(|entry| entry.event.access_code == code) {
            return code;
        }
    }
}
