/// Guild ownership and membership records, owned by an external service.
// region:    --- Imports
use crate::error::{EconomyError, Result};
use crate::{GuildId, MemberId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
// endregion: --- Imports

#[async_trait]
pub trait GuildDirectory: Send + Sync {
    async fn owner_of(&self, guild: GuildId) -> Option<MemberId>;

    async fn is_member(&self, guild: GuildId, member: MemberId) -> bool;
}

/// Seed record, as read from the `GUILD_DIRECTORY` file.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildRecord {
    pub guild_id: GuildId,
    pub owner_id: MemberId,
    #[serde(default)]
    pub members: Vec<MemberId>,
}

struct Roster {
    owner: MemberId,
    members: HashSet<MemberId>,
}

#[derive(Default)]
pub struct MemoryGuildDirectory {
    guilds: RwLock<HashMap<GuildId, Roster>>,
}

impl MemoryGuildDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = GuildRecord>) -> Self {
        let directory = Self::new();
        for record in records {
            directory.register_guild(record.guild_id, record.owner_id);
            for member in record.members {
                directory.add_member(record.guild_id, member);
            }
        }
        directory
    }

    /// The owner is always a member of their own guild.
    pub fn register_guild(&self, guild: GuildId, owner: MemberId) {
        let mut guilds = self.guilds.write().unwrap_or_else(|e| e.into_inner());
        guilds.insert(
            guild,
            Roster {
                owner,
                members: HashSet::from([owner]),
            },
        );
    }

    /// No-op for an unknown guild.
    pub fn add_member(&self, guild: GuildId, member: MemberId) {
        let mut guilds = self.guilds.write().unwrap_or_else(|e| e.into_inner());
        if let Some(roster) = guilds.get_mut(&guild) {
            roster.members.insert(member);
        }
    }
}

#[async_trait]
impl GuildDirectory for MemoryGuildDirectory {
    async fn owner_of(&self, guild: GuildId) -> Option<MemberId> {
        let guilds = self.guilds.read().unwrap_or_else(|e| e.into_inner());
        guilds.get(&guild).map(|roster| roster.owner)
    }

    async fn is_member(&self, guild: GuildId, member: MemberId) -> bool {
        let guilds = self.guilds.read().unwrap_or_else(|e| e.into_inner());
        guilds
            .get(&guild)
            .is_some_and(|roster| roster.members.contains(&member))
    }
}

// region:    --- Checks
/// `GuildNotFound` for an unknown guild, `NotOwner` for anyone but its owner.
pub async fn require_owner(
    directory: &dyn GuildDirectory,
    guild: GuildId,
    actor: MemberId,
) -> Result<()> {
    match directory.owner_of(guild).await {
        None => Err(EconomyError::GuildNotFound(guild)),
        Some(owner) if owner == actor => Ok(()),
        Some(_) => Err(EconomyError::NotOwner),
    }
}

pub async fn require_member(
    directory: &dyn GuildDirectory,
    guild: GuildId,
    actor: MemberId,
) -> Result<()> {
    if directory.is_member(guild, actor).await {
        Ok(())
    } else {
        Err(EconomyError::NotMember)
    }
}

pub async fn is_owner(directory: &dyn GuildDirectory, guild: GuildId, actor: MemberId) -> bool {
    directory.owner_of(guild).await == Some(actor)
}
// endregion: --- Checks

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ownership_and_membership_checks() {
        let directory = MemoryGuildDirectory::from_records([GuildRecord {
            guild_id: 1,
            owner_id: 10,
            members: vec![11],
        }]);

        assert!(require_owner(&directory, 1, 10).await.is_ok());
        assert_eq!(
            require_owner(&directory, 1, 11).await,
            Err(EconomyError::NotOwner)
        );
        assert_eq!(
            require_owner(&directory, 2, 10).await,
            Err(EconomyError::GuildNotFound(2))
        );
        assert!(require_member(&directory, 1, 10).await.is_ok());
        assert!(require_member(&directory, 1, 11).await.is_ok());
        assert_eq!(
            require_member(&directory, 1, 12).await,
            Err(EconomyError::NotMember)
        );
    }
}
