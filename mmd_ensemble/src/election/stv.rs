//! Multi-winner single transferable vote.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};
use snafu::ensure;

use crate::config::*;
use crate::election::ballot::Ballot;

type RoundId = u32;

// Weight moved away from one candidate during a round, by destination.
#[derive(PartialEq, Debug, Clone, Default)]
struct Transfers {
    to: BTreeMap<CandidateId, f64>,
    exhausted: f64,
}

impl Transfers {
    fn record(&mut self, next: Option<CandidateId>, weight: f64) {
        match next {
            Some(cid) => *self.to.entry(cid).or_insert(0.0) += weight,
            None => self.exhausted += weight,
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
enum RoundOutcome {
    Surplus(Vec<(CandidateId, Transfers)>),
    Elimination(CandidateId, Transfers),
}

#[derive(PartialEq, Debug, Clone)]
struct RoundStatistics {
    tally: BTreeMap<CandidateId, f64>,
    outcome: RoundOutcome,
}

/// Runs a multi-winner ranked-choice election.
///
/// The winning threshold is `ballots / (seats + 1)`. While more candidates
/// remain than seats, each round either elects every candidate strictly
/// above the threshold and transfers their surplus, or eliminates the
/// candidate with the lowest tally. The candidates still continuing when the
/// remaining ones fit the seats win too, in candidate id order.
///
/// Arguments:
/// * `ballots` the ballots, consumed by the tabulation
/// * `candidates` the candidates standing for election
/// * `seats` the number of winners, between 1 and the number of candidates
pub fn run_stv(
    mut ballots: Vec<Ballot>,
    candidates: &[Candidate],
    seats: usize,
    rules: &StvRules,
) -> MmdResult<ElectionResult> {
    ensure!(
        seats >= 1 && seats <= candidates.len(),
        InvalidSeatsSnafu {
            seats,
            candidates: candidates.len()
        }
    );
    let by_id: HashMap<CandidateId, &Candidate> = candidates.iter().map(|c| (c.id, c)).collect();
    for b in ballots.iter() {
        if let Some(cid) = b.remaining().iter().find(|cid| !by_id.contains_key(cid)) {
            return UnknownCandidateSnafu {
                name: format!("#{}", cid.0),
            }
            .fail();
        }
    }

    let threshold = ballots.len() as f64 / (seats + 1) as f64;
    info!(
        "run_stv: {} ballots, {} candidates, {} seats, threshold {}",
        ballots.len(),
        candidates.len(),
        seats,
        threshold
    );

    let mut continuing: BTreeSet<CandidateId> = by_id.keys().copied().collect();
    let mut winners: Vec<CandidateId> = Vec::new();
    let mut rounds: Vec<RoundStatistics> = Vec::new();
    for b in ballots.iter_mut() {
        b.skip_to_continuing(&continuing);
    }

    while continuing.len() + winners.len() > seats {
        let round_id = rounds.len() as RoundId + 1;
        let tally = compute_tally(&ballots, &continuing);
        debug!("round {}: tally {:?}", round_id, tally);

        // Highest tally first. With exact arithmetic at most `seats` candidates
        // can ever exceed the threshold; rounding must not elect more.
        let mut elected: Vec<CandidateId> = tally
            .iter()
            .filter(|(_, &t)| t > threshold)
            .map(|(&cid, _)| cid)
            .collect();
        elected.sort_by(|a, b| tally[b].total_cmp(&tally[a]).then(a.cmp(b)));
        elected.truncate(seats - winners.len());

        let outcome = if !elected.is_empty() {
            for cid in elected.iter() {
                continuing.remove(cid);
                winners.push(*cid);
            }
            let mut stats = Vec::new();
            for &cid in elected.iter() {
                let t = tally[&cid];
                let surplus_fraction = (t - threshold) / t;
                let transfers = transfer(&mut ballots, cid, &continuing, surplus_fraction, true);
                debug!(
                    "round {}: {:?} elected with {}, surplus fraction {}",
                    round_id, cid, t, surplus_fraction
                );
                stats.push((cid, transfers));
            }
            for b in ballots.iter_mut() {
                b.transferred = false;
            }
            RoundOutcome::Surplus(stats)
        } else {
            let loser = find_eliminated_candidate(&tally, rules.tiebreak_mode, &by_id, round_id);
            continuing.remove(&loser);
            debug!("round {}: {:?} eliminated with {}", round_id, loser, tally[&loser]);
            let transfers = transfer(&mut ballots, loser, &continuing, 1.0, false);
            RoundOutcome::Elimination(loser, transfers)
        };
        rounds.push(RoundStatistics { tally, outcome });
    }

    winners.extend(continuing.iter().copied());
    // Invariant: exactly one winner per seat.
    assert_eq!(
        winners.len(),
        seats,
        "STV returned {} winners for {} seats",
        winners.len(),
        seats
    );

    let winners: Vec<Candidate> = winners.iter().map(|cid| by_id[cid].clone()).collect();
    let round_stats = round_results_to_stats(&rounds, &by_id);
    for rs in round_stats.iter() {
        print_round(rs, threshold);
    }
    Ok(ElectionResult {
        winners,
        threshold,
        round_stats,
    })
}

fn compute_tally(
    ballots: &[Ballot],
    continuing: &BTreeSet<CandidateId>,
) -> BTreeMap<CandidateId, f64> {
    let mut tally: BTreeMap<CandidateId, f64> = continuing.iter().map(|&cid| (cid, 0.0)).collect();
    for b in ballots.iter() {
        if let Some(t) = b.top().and_then(|cid| tally.get_mut(&cid)) {
            *t += b.weight;
        }
    }
    tally
}

// Moves every ballot counting for `from` to its next continuing choice,
// scaling its weight by `fraction`. In surplus rounds a ballot moves at most
// once per round.
fn transfer(
    ballots: &mut [Ballot],
    from: CandidateId,
    continuing: &BTreeSet<CandidateId>,
    fraction: f64,
    surplus: bool,
) -> Transfers {
    let mut transfers = Transfers::default();
    for b in ballots.iter_mut() {
        if b.top() != Some(from) || (surplus && b.transferred) {
            continue;
        }
        b.weight *= fraction;
        let next = b.advance(continuing);
        if surplus {
            b.transferred = true;
        }
        transfers.record(next, b.weight);
    }
    transfers
}

fn find_eliminated_candidate(
    tally: &BTreeMap<CandidateId, f64>,
    tiebreak: TieBreakMode,
    by_id: &HashMap<CandidateId, &Candidate>,
    round_id: RoundId,
) -> CandidateId {
    let min_count = tally.values().copied().fold(f64::INFINITY, f64::min);
    // In id order.
    let all_smallest: Vec<CandidateId> = tally
        .iter()
        .filter(|(_, &t)| t <= min_count)
        .map(|(&cid, _)| cid)
        .collect();
    if all_smallest.len() > 1 {
        debug!(
            "find_eliminated_candidate: tie between {:?} in round {}",
            all_smallest, round_id
        );
    }
    match tiebreak {
        TieBreakMode::LowestCandidateId => all_smallest[0],
        TieBreakMode::Random(seed) => {
            let named: Vec<(CandidateId, String)> = all_smallest
                .iter()
                .map(|cid| (*cid, by_id[cid].name.clone()))
                .collect();
            candidate_permutation(&named, seed, round_id)[0]
        }
    }
}

/// A permutation of the candidates that is stable for a seed and a round but
/// hard to guess in advance.
///
/// Candidates are sorted by the SHA-256 digest of the seed, the round and
/// their name.
pub(crate) fn candidate_permutation(
    candidates: &[(CandidateId, String)],
    seed: u32,
    round_id: RoundId,
) -> Vec<CandidateId> {
    let mut data: Vec<(CandidateId, String)> = candidates
        .iter()
        .map(|(cid, name)| {
            let key = format!("{:08}{:08}{}", seed, round_id, name);
            (*cid, sha256::digest(key))
        })
        .collect();
    data.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    data.iter().map(|p| p.0).collect()
}

fn round_results_to_stats(
    rounds: &[RoundStatistics],
    by_id: &HashMap<CandidateId, &Candidate>,
) -> Vec<RoundStats> {
    let name = |cid: &CandidateId| by_id[cid].name.clone();
    let to_stats = |cid: &CandidateId, t: &Transfers| TransferStats {
        name: name(cid),
        transfers: t.to.iter().map(|(c, w)| (name(c), *w)).collect(),
        exhausted: t.exhausted,
    };
    rounds
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            let mut rs = RoundStats {
                round: idx as RoundId + 1,
                tally: r.tally.iter().map(|(cid, t)| (name(cid), *t)).collect(),
                tally_results_elected: Vec::new(),
                tally_results_eliminated: Vec::new(),
            };
            match &r.outcome {
                RoundOutcome::Surplus(elected) => {
                    for (cid, t) in elected.iter() {
                        rs.tally_results_elected.push(to_stats(cid, t));
                    }
                }
                RoundOutcome::Elimination(cid, t) => {
                    rs.tally_results_eliminated.push(to_stats(cid, t));
                }
            }
            rs
        })
        .collect()
}

fn print_round(rs: &RoundStats, threshold: f64) {
    info!("Round {} (winning threshold: {:.4})", rs.round, threshold);
    for (name, count) in rs.tally.iter() {
        let status = if rs.tally_results_elected.iter().any(|s| s.name == *name) {
            " -> elected"
        } else if rs.tally_results_eliminated.iter().any(|s| s.name == *name) {
            " -> eliminated"
        } else {
            ""
        };
        info!("{:>12.4} {}{}", count, name, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Candidate {
                id: CandidateId(i as u32 + 1),
                party: if i % 2 == 0 {
                    Party::Democrat
                } else {
                    Party::Republican
                },
                name: n.to_string(),
                district: 1,
            })
            .collect()
    }

    fn ballots(counts: &[(usize, &[u32])]) -> Vec<Ballot> {
        let mut res = Vec::new();
        for (count, ranks) in counts.iter() {
            for _ in 0..*count {
                res.push(Ballot::new(ranks.iter().map(|&i| CandidateId(i)).collect()));
            }
        }
        res
    }

    fn winner_names(r: &ElectionResult) -> Vec<String> {
        r.winners.iter().map(|c| c.name.clone()).collect()
    }

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn surplus_transfer_example() {
        init();
        // X = 1, Y = 2, Z = 3
        let cands = candidates(&["X", "Y", "Z"]);
        let bs = ballots(&[(5, &[1, 2, 3]), (4, &[2, 1, 3])]);
        let r = run_stv(bs, &cands, 2, &StvRules::DEFAULT_RULES).unwrap();
        assert_eq!(r.threshold, 3.0);
        assert_eq!(winner_names(&r), vec!["X", "Y"]);

        let first = &r.round_stats[0];
        assert_eq!(
            first.tally,
            vec![
                ("X".to_string(), 5.0),
                ("Y".to_string(), 4.0),
                ("Z".to_string(), 0.0)
            ]
        );
        // Both exceed the threshold in the first round; their surpluses go to Z.
        let x = &first.tally_results_elected[0];
        assert_eq!(x.name, "X");
        assert!((x.transfers[0].1 - 2.0).abs() < 1e-9);
        let y = &first.tally_results_elected[1];
        assert!((y.transfers[0].1 - 1.0).abs() < 1e-9);

        // Z holds exactly the threshold, which does not exceed it, and is eliminated.
        let second = &r.round_stats[1];
        assert!((second.tally[0].1 - 3.0).abs() < 1e-9);
        assert_eq!(second.tally_results_eliminated[0].name, "Z");
        assert_eq!(r.round_stats.len(), 2);
    }

    #[test]
    fn elimination_transfers_votes() {
        init();
        // 10 ballots, 1 seat: threshold 5. C is eliminated and its ballots
        // go to A, which then exceeds the threshold.
        let cands = candidates(&["A", "B", "C"]);
        let bs = ballots(&[(4, &[1]), (4, &[2]), (2, &[3, 1])]);
        let r = run_stv(bs, &cands, 1, &StvRules::DEFAULT_RULES).unwrap();
        assert_eq!(winner_names(&r), vec!["A"]);
        let elim = &r.round_stats[0].tally_results_eliminated[0];
        assert_eq!(elim.name, "C");
        assert_eq!(elim.transfers, vec![("A".to_string(), 2.0)]);
        assert_eq!(r.round_stats[1].tally_results_elected[0].name, "A");
    }

    #[test]
    fn winner_count_law() {
        init();
        let cands = candidates(&["A", "B", "C", "D", "E", "F"]);
        let bs = ballots(&[
            (7, &[1, 3, 5]),
            (3, &[2, 4]),
            (6, &[6, 2, 1]),
            (1, &[4]),
            (2, &[5, 6, 4, 3]),
        ]);
        for k in 1..=cands.len() {
            let r = run_stv(bs.clone(), &cands, k, &StvRules::DEFAULT_RULES).unwrap();
            assert_eq!(r.winners.len(), k);
            let mut ids: Vec<CandidateId> = r.winners.iter().map(|c| c.id).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), k);
        }
    }

    #[test]
    fn ties_eliminate_lowest_id() {
        init();
        // Nobody reaches 4/2 = 2 strictly; B and C tie at 1.
        let cands = candidates(&["A", "B", "C"]);
        let bs = ballots(&[(2, &[1]), (1, &[2]), (1, &[3])]);
        let r = run_stv(bs.clone(), &cands, 1, &StvRules::DEFAULT_RULES).unwrap();
        assert_eq!(r.round_stats[0].tally_results_eliminated[0].name, "B");
        assert_eq!(winner_names(&r), vec!["A"]);

        // The seeded permutation is stable for a given seed.
        let rules = StvRules {
            tiebreak_mode: TieBreakMode::Random(42),
        };
        let r1 = run_stv(bs.clone(), &cands, 1, &rules).unwrap();
        let r2 = run_stv(bs, &cands, 1, &rules).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn random_tiebreak_depends_on_seed() {
        init();
        // Three-way tie at 1 ballot each: the first elimination is decided
        // by the tie-break alone.
        let cands = candidates(&["Amy", "Ben", "Cat"]);
        let bs = ballots(&[(1, &[1]), (1, &[2]), (1, &[3])]);
        let mut first_eliminated = BTreeSet::new();
        for seed in 0..50 {
            let rules = StvRules {
                tiebreak_mode: TieBreakMode::Random(seed),
            };
            let r = run_stv(bs.clone(), &cands, 1, &rules).unwrap();
            assert_eq!(r.winners.len(), 1);
            first_eliminated.insert(r.round_stats[0].tally_results_eliminated[0].name.clone());
        }
        assert!(first_eliminated.len() > 1, "{:?}", first_eliminated);
    }

    #[test]
    fn permutation_changes_with_round() {
        let named: Vec<(CandidateId, String)> = ["Amy", "Ben", "Cat", "Dan"]
            .iter()
            .enumerate()
            .map(|(i, n)| (CandidateId(i as u32 + 1), n.to_string()))
            .collect();
        let p1 = candidate_permutation(&named, 7, 1);
        assert_eq!(p1, candidate_permutation(&named, 7, 1));
        assert_eq!(p1.len(), 4);
        let differs = (2..20).any(|round| candidate_permutation(&named, 7, round) != p1);
        assert!(differs);
    }

    #[test]
    fn exhausted_ballots_are_counted() {
        let cands = candidates(&["A", "B", "C"]);
        let bs = ballots(&[(3, &[1]), (2, &[2]), (1, &[3])]);
        let r = run_stv(bs, &cands, 2, &StvRules::DEFAULT_RULES).unwrap();
        // threshold 2: A elected in round 1 with a surplus that exhausts.
        let a = &r.round_stats[0].tally_results_elected[0];
        assert_eq!(a.name, "A");
        assert!(a.transfers.is_empty());
        assert!((a.exhausted - 1.0).abs() < 1e-9);
        assert_eq!(winner_names(&r), vec!["A", "B"]);
    }

    #[test]
    fn all_candidates_win_when_seats_match() {
        let cands = candidates(&["A", "B"]);
        let r = run_stv(vec![], &cands, 2, &StvRules::DEFAULT_RULES).unwrap();
        assert_eq!(winner_names(&r), vec!["A", "B"]);
        assert!(r.round_stats.is_empty());
    }

    #[test]
    fn invalid_input() {
        let cands = candidates(&["A", "B"]);
        assert!(matches!(
            run_stv(vec![], &cands, 0, &StvRules::DEFAULT_RULES),
            Err(MmdError::InvalidSeats { seats: 0, candidates: 2 })
        ));
        assert!(matches!(
            run_stv(vec![], &cands, 3, &StvRules::DEFAULT_RULES),
            Err(MmdError::InvalidSeats { seats: 3, .. })
        ));
        let bs = vec![Ballot::new(vec![CandidateId(9)])];
        assert!(matches!(
            run_stv(bs, &cands, 1, &StvRules::DEFAULT_RULES),
            Err(MmdError::UnknownCandidate { .. })
        ));
    }
}
