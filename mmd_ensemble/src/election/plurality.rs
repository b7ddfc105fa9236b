use std::collections::BTreeMap;

use log::debug;
use snafu::ensure;

use crate::config::*;
use crate::election::ballot::Ballot;
use crate::election::stv::candidate_permutation;
use crate::election::Tabulator;

/// Elects the `seats` candidates with the most first-choice weight. Ties are
/// broken with the tie-break mode of the rules, as in the STV count.
#[derive(Debug, Clone, Copy)]
pub struct PluralityTabulator {
    pub rules: StvRules,
}

impl Default for PluralityTabulator {
    fn default() -> PluralityTabulator {
        PluralityTabulator {
            rules: StvRules::DEFAULT_RULES,
        }
    }
}

// Position of each candidate among equal tallies.
fn tiebreak_ranks(candidates: &[Candidate], mode: TieBreakMode) -> BTreeMap<CandidateId, usize> {
    let order: Vec<CandidateId> = match mode {
        TieBreakMode::LowestCandidateId => {
            let mut ids: Vec<CandidateId> = candidates.iter().map(|c| c.id).collect();
            ids.sort();
            ids
        }
        TieBreakMode::Random(seed) => {
            let named: Vec<(CandidateId, String)> =
                candidates.iter().map(|c| (c.id, c.name.clone())).collect();
            candidate_permutation(&named, seed, 1)
        }
    };
    order.into_iter().enumerate().map(|(pos, cid)| (cid, pos)).collect()
}

impl Tabulator for PluralityTabulator {
    fn name(&self) -> &str {
        "plurality"
    }

    fn tabulate(
        &self,
        ballots: Vec<Ballot>,
        candidates: &[Candidate],
        seats: usize,
    ) -> MmdResult<ElectionResult> {
        ensure!(
            seats >= 1 && seats <= candidates.len(),
            InvalidSeatsSnafu {
                seats,
                candidates: candidates.len()
            }
        );
        let mut tally: BTreeMap<CandidateId, f64> =
            candidates.iter().map(|c| (c.id, 0.0)).collect();
        for b in ballots.iter() {
            if let Some(cid) = b.top() {
                match tally.get_mut(&cid) {
                    Some(t) => *t += b.weight,
                    None => {
                        return UnknownCandidateSnafu {
                            name: format!("#{}", cid.0),
                        }
                        .fail()
                    }
                }
            }
        }
        let ranks = tiebreak_ranks(candidates, self.rules.tiebreak_mode);
        let mut order: Vec<&Candidate> = candidates.iter().collect();
        order.sort_by(|a, b| {
            tally[&b.id]
                .total_cmp(&tally[&a.id])
                .then(ranks[&a.id].cmp(&ranks[&b.id]))
        });
        let winners: Vec<Candidate> = order.into_iter().take(seats).cloned().collect();
        debug!("plurality: tally {:?}, winners {:?}", tally, winners);

        let name = |cid: &CandidateId| {
            candidates
                .iter()
                .find(|c| c.id == *cid)
                .map(|c| c.name.clone())
                .unwrap_or_default()
        };
        let round = RoundStats {
            round: 1,
            tally: tally.iter().map(|(cid, t)| (name(cid), *t)).collect(),
            tally_results_elected: winners
                .iter()
                .map(|c| TransferStats {
                    name: c.name.clone(),
                    transfers: Vec::new(),
                    exhausted: 0.0,
                })
                .collect(),
            tally_results_eliminated: Vec::new(),
        };
        Ok(ElectionResult {
            winners,
            threshold: 0.0,
            round_stats: vec![round],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::election::district_candidates;

    #[test]
    fn top_first_choices_win() {
        let cands = district_candidates(1, 2);
        let ids: Vec<CandidateId> = cands.iter().map(|c| c.id).collect();
        let mut ballots = Vec::new();
        for (i, n) in [(0, 1), (1, 5), (2, 3), (3, 3)] {
            for _ in 0..n {
                ballots.push(Ballot::new(vec![ids[i]]));
            }
        }
        let r = PluralityTabulator::default().tabulate(ballots, &cands, 2).unwrap();
        // 5 for the second candidate, then a tie at 3 won by the lower id.
        assert_eq!(r.winners, vec![cands[1].clone(), cands[2].clone()]);
        assert_eq!(r.round_stats.len(), 1);
    }

    #[test]
    fn random_tiebreak_orders_equal_tallies() {
        let cands = district_candidates(1, 2);
        let ballots: Vec<Ballot> = cands.iter().map(|c| Ballot::new(vec![c.id])).collect();
        let mut winners = std::collections::BTreeSet::new();
        for seed in 0..50 {
            let tab = PluralityTabulator {
                rules: StvRules {
                    tiebreak_mode: TieBreakMode::Random(seed),
                },
            };
            let r = tab.tabulate(ballots.clone(), &cands, 1).unwrap();
            assert_eq!(r.winners.len(), 1);
            winners.insert(r.winners[0].id);
        }
        // All four candidates tie: the seed decides the winner.
        assert!(winners.len() > 1, "{:?}", winners);

        let r = PluralityTabulator::default()
            .tabulate(ballots, &cands, 1)
            .unwrap();
        assert_eq!(r.winners[0].id, cands[0].id);
    }

    #[test]
    fn rejects_too_many_seats() {
        let cands = district_candidates(1, 1);
        assert!(matches!(
            PluralityTabulator::default().tabulate(vec![], &cands, 3),
            Err(MmdError::InvalidSeats { .. })
        ));
    }
}
