/// Participation state machine:
/// not participating -> interested -> confirmed -> attended (terminal)
/// The attended step belongs to `AccessCodeValidator`.
// region:    --- Imports
use super::model::{Participation, ParticipationStatus};
use super::registry::EventRegistry;
use crate::clock::Clock;
use crate::error::{EconomyError, Result};
use crate::guild::{require_member, GuildDirectory};
use crate::{EventId, MemberId};
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
// endregion: --- Imports

pub struct ParticipationStateMachine {
    registry: Arc<EventRegistry>,
    directory: Arc<dyn GuildDirectory>,
    clock: Arc<dyn Clock>,
}

impl ParticipationStateMachine {
    pub fn new(
        registry: Arc<EventRegistry>,
        directory: Arc<dyn GuildDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            directory,
            clock,
        }
    }

    /// not participating -> interested
    pub async fn signup(&self, event_id: EventId, member: MemberId) -> Result<Participation> {
        let entry = self.registry.entry(event_id)?;
        require_member(self.directory.as_ref(), entry.event.guild_id, member).await?;

        let participation = Participation::interested(event_id, member, self.clock.now());
        {
            let mut participants = entry
                .participants
                .write()
                .unwrap_or_else(|e| e.into_inner());
            entry.ensure_live()?;
            match participants.entry(member) {
                Entry::Occupied(_) => {
                    info!(
                        "{:<12} --> signup rejected event={} member={}: already participating",
                        "Events", event_id, member
                    );
                    return Err(EconomyError::AlreadyParticipating);
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(Mutex::new(participation.clone())));
                }
            }
        }

        info!("{:<12} --> signup event={} member={}", "Events", event_id, member);
        Ok(participation)
    }

    /// interested -> confirmed
    pub async fn confirm(&self, event_id: EventId, member: MemberId) -> Result<Participation> {
        let entry = self.registry.entry(event_id)?;
        require_member(self.directory.as_ref(), entry.event.guild_id, member).await?;

        let slot = entry.slot(member).ok_or(EconomyError::NotSignedUp)?;
        let mut participation = slot.lock().await;
        entry.ensure_live()?;
        if !participation
            .status
            .can_advance_to(ParticipationStatus::Confirmed)
        {
            info!(
                "{:<12} --> confirm rejected event={} member={} status={:?}",
                "Events", event_id, member, participation.status
            );
            return Err(EconomyError::AlreadyConfirmedOrAttended);
        }
        participation.status = ParticipationStatus::Confirmed;

        info!("{:<12} --> confirmed event={} member={}", "Events", event_id, member);
        Ok(participation.clone())
    }

    pub async fn get(&self, event_id: EventId, member: MemberId) -> Result<Option<Participation>> {
        let entry = self.registry.entry(event_id)?;
        let Some(slot) = entry.slot(member) else {
            return Ok(None);
        };
        let participation = slot.lock().await;
        Ok(Some(participation.clone()))
    }
}
