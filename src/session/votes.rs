use serenity::model::id::UserId;
use std::collections::HashSet;

/// Votos para saltar el track actual.
#[derive(Debug, Clone)]
pub struct SkipVotes {
    voters: HashSet<UserId>,
    threshold: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// Voto nuevo; todavía no alcanza el umbral
    Counted(usize),
    /// Voto nuevo que alcanza el umbral
    ThresholdReached(usize),
    /// El usuario ya había votado por este track
    Duplicate(usize),
}

impl SkipVotes {
    pub fn new(threshold: usize) -> Self {
        Self {
            voters: HashSet::new(),
            threshold: threshold.max(1),
        }
    }

    pub fn add(&mut self, voter: UserId) -> Vote {
        if !self.voters.insert(voter) {
            return Vote::Duplicate(self.voters.len());
        }

        let total = self.voters.len();
        if total >= self.threshold {
            Vote::ThresholdReached(total)
        } else {
            Vote::Counted(total)
        }
    }

    pub fn clear(&mut self) {
        self.voters.clear();
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}
