//! Elections on district maps: candidates, ballots, tabulators and the
//! statewide runners.

pub mod ballot;
pub mod plurality;
pub mod statewide;
pub mod stv;
pub mod voting_model;

use crate::config::*;
use crate::election::ballot::Ballot;
use crate::graph::DistrictId;

pub use crate::election::plurality::PluralityTabulator;
pub use crate::election::statewide::*;
pub use crate::election::voting_model::{ComparatorVoting, PartyLineVoting, VotingModel};

/// Picks `seats` winners from ranked ballots.
pub trait Tabulator: Send + Sync {
    fn name(&self) -> &str;

    fn tabulate(
        &self,
        ballots: Vec<Ballot>,
        candidates: &[Candidate],
        seats: usize,
    ) -> MmdResult<ElectionResult>;
}

/// The multi-winner single transferable vote.
#[derive(Debug, Clone, Copy)]
pub struct StvTabulator {
    pub rules: StvRules,
}

impl Default for StvTabulator {
    fn default() -> StvTabulator {
        StvTabulator {
            rules: StvRules::DEFAULT_RULES,
        }
    }
}

impl Tabulator for StvTabulator {
    fn name(&self) -> &str {
        "stv"
    }

    fn tabulate(
        &self,
        ballots: Vec<Ballot>,
        candidates: &[Candidate],
        seats: usize,
    ) -> MmdResult<ElectionResult> {
        stv::run_stv(ballots, candidates, seats, &self.rules)
    }
}

/// The candidates of one district: `seats` Democrats then `seats`
/// Republicans, numbered from 1.
pub fn district_candidates(district: DistrictId, seats: u32) -> Vec<Candidate> {
    let mut res = Vec::with_capacity(2 * seats as usize);
    for party in Party::ALL {
        for _ in 0..seats {
            let id = res.len() as u32 + 1;
            res.push(Candidate {
                id: CandidateId(id),
                party,
                name: format!("Candidate {}", id),
                district,
            });
        }
    }
    res
}
