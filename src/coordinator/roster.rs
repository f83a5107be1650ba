use serde::Serialize;

use crate::common::types::ParticipantId;

/// Participants the coordinator still considers active. Fixed at game start,
/// it only ever shrinks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    members: Vec<ParticipantId>,
}

impl Roster {
    pub fn new(members: Vec<ParticipantId>) -> Self {
        let mut unique: Vec<ParticipantId> = Vec::with_capacity(members.len());
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }
        Self { members: unique }
    }

    pub fn members(&self) -> &[ParticipantId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.members.contains(id)
    }

    /// Drops every member listed in `gone`, returning those actually removed.
    pub fn remove_all(&mut self, gone: &[ParticipantId]) -> Vec<ParticipantId> {
        let removed: Vec<ParticipantId> = self
            .members
            .iter()
            .filter(|member| gone.contains(member))
            .cloned()
            .collect();
        self.members.retain(|member| !gone.contains(member));
        removed
    }
}
