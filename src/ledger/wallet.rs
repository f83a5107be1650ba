use serde::Serialize;

use crate::common::types::ParticipantId;

/// Accumulated coins per participant, in order of first credit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WalletLedger {
    entries: Vec<(ParticipantId, u64)>,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coins` to `id`'s balance, creating the entry on first credit.
    pub fn credit(&mut self, id: &ParticipantId, coins: u64) {
        match self.entries.iter_mut().find(|(owner, _)| owner == id) {
            Some((_, balance)) => *balance = balance.saturating_add(coins),
            None => self.entries.push((id.clone(), coins)),
        }
    }

    pub fn balance(&self, id: &ParticipantId) -> Option<u64> {
        self.entries
            .iter()
            .find(|(owner, _)| owner == id)
            .map(|(_, balance)| *balance)
    }

    pub fn entries(&self) -> &[(ParticipantId, u64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest balance among entries accepted by `eligible`. Ties go to the
    /// entry credited first.
    pub fn winner(
        &self,
        mut eligible: impl FnMut(&ParticipantId) -> bool,
    ) -> Option<(ParticipantId, u64)> {
        let mut best: Option<&(ParticipantId, u64)> = None;
        for entry in self.entries.iter().filter(|(owner, _)| eligible(owner)) {
            match best {
                Some((_, top)) if entry.1 <= *top => {}
                _ => best = Some(entry),
            }
        }
        best.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ParticipantId {
        ParticipantId::from(name)
    }

    #[test]
    fn test_credit_accumulates() {
        let mut wallets = WalletLedger::new();
        assert!(wallets.is_empty());
        wallets.credit(&id("m1"), 40);
        wallets.credit(&id("m2"), 5);
        wallets.credit(&id("m1"), 2);
        assert_eq!(wallets.balance(&id("m1")), Some(42));
        assert_eq!(wallets.balance(&id("m2")), Some(5));
        assert_eq!(wallets.balance(&id("m3")), None);
    }

    #[test]
    fn test_tie_goes_to_first_in_ledger_order() {
        let mut wallets = WalletLedger::new();
        wallets.credit(&id("A"), 120);
        wallets.credit(&id("B"), 95);
        wallets.credit(&id("C"), 120);
        assert_eq!(wallets.winner(|_| true), Some((id("A"), 120)));

        let mut wallets = WalletLedger::new();
        wallets.credit(&id("C"), 120);
        wallets.credit(&id("A"), 120);
        wallets.credit(&id("B"), 95);
        assert_eq!(wallets.winner(|_| true), Some((id("C"), 120)));
    }

    #[test]
    fn test_winner_respects_eligibility() {
        let mut wallets = WalletLedger::new();
        wallets.credit(&id("gone"), 500);
        wallets.credit(&id("m2"), 95);
        let winner = wallets.winner(|owner| owner.as_str() != "gone");
        assert_eq!(winner, Some((id("m2"), 95)));
    }

    #[test]
    fn test_no_entries_no_winner() {
        assert_eq!(WalletLedger::new().winner(|_| true), None);
    }
}
