//! Voting models turn the vote tallies of a precinct into ranked ballots.

use std::cmp::Ordering;

use rand::seq::SliceRandom;
use rand::RngCore;

use crate::config::*;
use crate::election::ballot::Ballot;
use crate::graph::Precinct;

pub trait VotingModel: Send + Sync {
    fn name(&self) -> &str;

    /// One ballot per voter of `precinct`.
    fn ballots(
        &self,
        precinct: &Precinct,
        candidates: &[Candidate],
        rng: &mut dyn RngCore,
    ) -> Vec<Ballot>;
}

fn party_candidates(candidates: &[Candidate], party: Party) -> Vec<CandidateId> {
    candidates
        .iter()
        .filter(|c| c.party == party)
        .map(|c| c.id)
        .collect()
}

/// Every voter ranks all the candidates of their party first, then all the
/// candidates of the other party. Each block is shuffled per voter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartyLineVoting;

impl VotingModel for PartyLineVoting {
    fn name(&self) -> &str {
        "party_line"
    }

    fn ballots(
        &self,
        precinct: &Precinct,
        candidates: &[Candidate],
        rng: &mut dyn RngCore,
    ) -> Vec<Ballot> {
        let mut res = Vec::with_capacity(precinct.votes.total() as usize);
        for (party, other) in [
            (Party::Democrat, Party::Republican),
            (Party::Republican, Party::Democrat),
        ] {
            let mut own = party_candidates(candidates, party);
            let mut rest = party_candidates(candidates, other);
            for _ in 0..precinct.votes.for_party(party) {
                own.shuffle(rng);
                rest.shuffle(rng);
                let mut choices = own.clone();
                choices.extend_from_slice(&rest);
                res.push(Ballot::new(choices));
            }
        }
        res
    }
}

/// Every voter ranks the candidates with a comparator given the voter's
/// party. The ordering is the same for all voters of a party.
pub struct ComparatorVoting<F> {
    name: String,
    compare: F,
}

impl<F> ComparatorVoting<F>
where
    F: Fn(Party, &Candidate, &Candidate) -> Ordering + Send + Sync,
{
    pub fn new(name: &str, compare: F) -> ComparatorVoting<F> {
        ComparatorVoting {
            name: name.to_string(),
            compare,
        }
    }
}

impl<F> VotingModel for ComparatorVoting<F>
where
    F: Fn(Party, &Candidate, &Candidate) -> Ordering + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn ballots(
        &self,
        precinct: &Precinct,
        candidates: &[Candidate],
        _rng: &mut dyn RngCore,
    ) -> Vec<Ballot> {
        let mut res = Vec::with_capacity(precinct.votes.total() as usize);
        for party in Party::ALL {
            let mut ranked: Vec<&Candidate> = candidates.iter().collect();
            ranked.sort_by(|a, b| (self.compare)(party, a, b));
            let choices: Vec<CandidateId> = ranked.iter().map(|c| c.id).collect();
            for _ in 0..precinct.votes.for_party(party) {
                res.push(Ballot::new(choices.clone()));
            }
        }
        res
    }
}
