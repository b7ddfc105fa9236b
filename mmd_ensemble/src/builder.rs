use crate::config::*;
use crate::election::ballot::Ballot;
use crate::election::stv::run_stv;
use snafu::{ensure, OptionExt};

/// A builder for one ranked-choice election, with candidates and ballots
/// given by name.
///
/// ```
/// use mmd_ensemble::builder::Builder;
/// use mmd_ensemble::{Party, StvRules};
/// # use mmd_ensemble::MmdError;
///
/// let mut builder = Builder::new(&StvRules::DEFAULT_RULES)?.candidates(&[
///     ("Anna".to_string(), Party::Democrat),
///     ("Bob".to_string(), Party::Republican),
/// ])?;
///
/// builder.add_ballot_simple(&["Anna".to_string(), "Bob".to_string()])?;
/// let result = builder.run(1)?;
/// assert_eq!(result.winners[0].name, "Anna");
///
/// # Ok::<(), MmdError>(())
/// ```
pub struct Builder {
    pub(crate) _rules: StvRules,
    pub(crate) _candidates: Vec<Candidate>,
    pub(crate) _ballots: Vec<Ballot>,
}

impl Builder {
    pub fn new(rules: &StvRules) -> MmdResult<Builder> {
        Ok(Builder {
            _rules: *rules,
            _candidates: Vec::new(),
            _ballots: Vec::new(),
        })
    }

    /// Registers the candidates, numbered from 1 in the order given. Resets
    /// the ballots added so far.
    pub fn candidates(self, cands: &[(String, Party)]) -> MmdResult<Builder> {
        Ok(Builder {
            _rules: self._rules,
            _candidates: cands
                .iter()
                .enumerate()
                .map(|(idx, (name, party))| Candidate {
                    id: CandidateId(idx as u32 + 1),
                    party: *party,
                    name: name.clone(),
                    district: 0,
                })
                .collect(),
            _ballots: Vec::new(),
        })
    }

    /// Adds one ballot.
    pub fn add_ballot_simple(&mut self, choices: &[String]) -> MmdResult<()> {
        self.add_ballot(choices, 1)
    }

    /// Adds `count` identical ballots. Blank choices are skipped; every other
    /// choice must name a registered candidate.
    pub fn add_ballot(&mut self, choices: &[String], count: u32) -> MmdResult<()> {
        let mut ranks: Vec<CandidateId> = Vec::with_capacity(choices.len());
        for name in choices.iter().filter(|n| !n.is_empty()) {
            let cand = self
                ._candidates
                .iter()
                .find(|c| c.name == *name)
                .context(UnknownCandidateSnafu { name: name.clone() })?;
            ranks.push(cand.id);
        }
        for _ in 0..count {
            self._ballots.push(Ballot::new(ranks.clone()));
        }
        Ok(())
    }

    pub fn candidate_list(&self) -> &[Candidate] {
        &self._candidates
    }

    pub fn ballots(&self) -> &[Ballot] {
        &self._ballots
    }

    /// Tabulates the election for `seats` winners with the single
    /// transferable vote.
    pub fn run(self, seats: usize) -> MmdResult<ElectionResult> {
        ensure!(
            !self._candidates.is_empty(),
            InvalidSeatsSnafu {
                seats,
                candidates: 0usize
            }
        );
        run_stv(self._ballots, &self._candidates, seats, &self._rules)
    }
}
