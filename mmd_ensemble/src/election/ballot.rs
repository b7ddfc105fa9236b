use std::collections::BTreeSet;

use crate::config::CandidateId;

/// A ranked ballot with a read cursor.
///
/// The cursor only moves forward: choices before it are spent. The weight
/// starts at 1 and only shrinks, when the ballot carries a surplus.
#[derive(PartialEq, Debug, Clone)]
pub struct Ballot {
    choices: Vec<CandidateId>,
    cursor: usize,
    pub weight: f64,
    /// Set once the ballot moved during the current surplus round.
    pub transferred: bool,
}

impl Ballot {
    pub fn new(choices: Vec<CandidateId>) -> Ballot {
        Ballot::with_weight(choices, 1.0)
    }

    pub fn with_weight(choices: Vec<CandidateId>, weight: f64) -> Ballot {
        Ballot {
            choices,
            cursor: 0,
            weight,
            transferred: false,
        }
    }

    /// The candidate this ballot currently counts for.
    pub fn top(&self) -> Option<CandidateId> {
        self.choices.get(self.cursor).copied()
    }

    /// An exhausted ballot no longer counts for anyone.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.choices.len()
    }

    /// The choices not spent yet, top first.
    pub fn remaining(&self) -> &[CandidateId] {
        &self.choices[self.cursor.min(self.choices.len())..]
    }

    /// Skips the leading choices that are not continuing.
    pub fn skip_to_continuing(
        &mut self,
        continuing: &BTreeSet<CandidateId>,
    ) -> Option<CandidateId> {
        while let Some(c) = self.top() {
            if continuing.contains(&c) {
                return Some(c);
            }
            self.cursor += 1;
        }
        None
    }

    /// Drops the top choice, then moves to the next continuing one.
    pub fn advance(&mut self, continuing: &BTreeSet<CandidateId>) -> Option<CandidateId> {
        if !self.is_exhausted() {
            self.cursor += 1;
        }
        self.skip_to_continuing(continuing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[u32]) -> Vec<CandidateId> {
        v.iter().map(|&i| CandidateId(i)).collect()
    }

    #[test]
    fn advance_skips_removed_candidates() {
        let mut b = Ballot::new(ids(&[1, 2, 3, 4]));
        assert_eq!(b.top(), Some(CandidateId(1)));
        let continuing: BTreeSet<CandidateId> = ids(&[1, 4]).into_iter().collect();
        assert_eq!(b.advance(&continuing), Some(CandidateId(4)));
        assert_eq!(b.remaining(), &ids(&[4])[..]);
        assert_eq!(b.advance(&continuing), None);
        assert!(b.is_exhausted());
        assert_eq!(b.advance(&continuing), None);
        assert_eq!(b.weight, 1.0);
    }

    #[test]
    fn skip_keeps_continuing_top() {
        let mut b = Ballot::new(ids(&[5, 6]));
        let continuing: BTreeSet<CandidateId> = ids(&[6]).into_iter().collect();
        assert_eq!(b.skip_to_continuing(&continuing), Some(CandidateId(6)));
        assert_eq!(b.skip_to_continuing(&continuing), Some(CandidateId(6)));
        let empty = Ballot::new(vec![]);
        assert!(empty.is_exhausted());
        assert_eq!(empty.top(), None);
    }
}
