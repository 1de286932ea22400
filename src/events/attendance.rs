/// Access-code validation: confirmed -> attended, crediting the event reward once.
// region:    --- Imports
use super::model::ParticipationStatus;
use super::registry::EventRegistry;
use crate::clock::Clock;
use crate::error::{EconomyError, Result};
use crate::guild::{require_member, GuildDirectory};
use crate::ledger::DkpLedger;
use crate::{EventId, MemberId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
// endregion: --- Imports

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceReceipt {
    pub dkp_earned: i64,
    pub total_dkp: i64,
}

pub struct AccessCodeValidator {
    registry: Arc<EventRegistry>,
    ledger: Arc<dyn DkpLedger>,
    directory: Arc<dyn GuildDirectory>,
    clock: Arc<dyn Clock>,
}

impl AccessCodeValidator {
    pub fn new(
        registry: Arc<EventRegistry>,
        ledger: Arc<dyn DkpLedger>,
        directory: Arc<dyn GuildDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            ledger,
            directory,
            clock,
        }
    }

    /// Checks run in order: state, window, code. The participation lock is held
    /// from the state check until the record is marked attended, so concurrent
    /// calls for the same (event, member) credit at most once.
    pub async fn validate(
        &self,
        event_id: EventId,
        member: MemberId,
        submitted_code: &str,
    ) -> Result<AttendanceReceipt> {
        let entry = self.registry.entry(event_id)?;
        let event = &entry.event;
        require_member(self.directory.as_ref(), event.guild_id, member).await?;

        let slot = entry.slot(member).ok_or(EconomyError::WrongState)?;
        let mut participation = slot.lock().await;
        entry.ensure_live()?;

        match participation.status {
            ParticipationStatus::Attended => {
                info!(
                    "{:<12} --> already validated event={} member={}",
                    "Attendance", event_id, member
                );
                return Err(EconomyError::AlreadyValidated);
            }
            ParticipationStatus::Interested => return Err(EconomyError::WrongState),
            ParticipationStatus::Confirmed => {}
        }

        let now = self.clock.now();
        if !event.accepts_validation_at(now) {
            info!(
                "{:<12} --> out of window event={} member={} now={}",
                "Attendance", event_id, member, now
            );
            return Err(EconomyError::OutOfWindow);
        }
        if !event.code_matches(submitted_code) {
            info!(
                "{:<12} --> invalid code event={} member={}",
                "Attendance", event_id, member
            );
            return Err(EconomyError::InvalidCode);
        }

        // Credit first: a ledger failure leaves the record confirmed and retryable.
        let reason = format!("event:{}", event.id);
        let total_dkp = self
            .ledger
            .credit(member, event.dkp_reward, &reason)
            .await
            .map_err(|e| {
                error!(
                    "{:<12} --> credit failed event={} member={}: {}",
                    "Attendance", event_id, member, e
                );
                EconomyError::from(e)
            })?;

        participation.status = ParticipationStatus::Attended;
        participation.attended_at = Some(now);
        participation.dkp_earned = event.dkp_reward;

        info!(
            "{:<12} --> attended event={} member={} earned={} total={}",
            "Attendance", event_id, member, event.dkp_reward, total_dkp
        );
        Ok(AttendanceReceipt {
            dkp_earned: event.dkp_reward,
            total_dkp,
        })
    }
}
