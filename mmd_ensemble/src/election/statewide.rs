//! Statewide elections: one election per district of a map, and one
//! statewide election per map of an ensemble.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::config::*;
use crate::election::{district_candidates, Tabulator, VotingModel};
use crate::ensemble::Ensemble;
use crate::graph::DistrictId;
use crate::partition::DistrictPartition;

/// Seats won by each party.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Hash, Serialize, Deserialize)]
pub struct PartySplit {
    pub dem: u32,
    pub rep: u32,
}

impl PartySplit {
    pub fn from_winners(winners: &[Candidate]) -> PartySplit {
        let mut split = PartySplit::default();
        for c in winners.iter() {
            match c.party {
                Party::Democrat => split.dem += 1,
                Party::Republican => split.rep += 1,
            }
        }
        split
    }

    pub fn total(&self) -> u32 {
        self.dem + self.rep
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct DistrictOutcome {
    pub district: DistrictId,
    pub seats: u32,
    pub result: ElectionResult,
}

#[derive(PartialEq, Debug, Clone)]
pub struct StatewideResult {
    /// In district id order.
    pub districts: Vec<DistrictOutcome>,
    pub split: PartySplit,
}

impl StatewideResult {
    pub fn winners(&self) -> Vec<Candidate> {
        self.districts
            .iter()
            .flat_map(|d| d.result.winners.iter().cloned())
            .collect()
    }

    pub fn winners_by_district(&self) -> BTreeMap<DistrictId, Vec<Candidate>> {
        self.districts
            .iter()
            .map(|d| (d.district, d.result.winners.clone()))
            .collect()
    }
}

/// Runs the election of one district: fresh candidates for its seats, and
/// the ballots of every precinct it holds.
pub fn run_district_election(
    partition: &DistrictPartition,
    district: DistrictId,
    model: &dyn VotingModel,
    tabulator: &dyn Tabulator,
    rng: &mut dyn RngCore,
) -> MmdResult<ElectionResult> {
    let seats = partition.reps(district);
    let candidates = district_candidates(district, seats);
    let mut ballots = Vec::new();
    for &node in partition.part(district).iter() {
        ballots.extend(model.ballots(partition.graph().precinct(node), &candidates, rng));
    }
    debug!(
        "district {}: {} seats, {} ballots",
        district,
        seats,
        ballots.len()
    );
    tabulator.tabulate(ballots, &candidates, seats as usize)
}

pub fn run_statewide_election(
    partition: &DistrictPartition,
    model: &dyn VotingModel,
    tabulator: &dyn Tabulator,
    rng: &mut dyn RngCore,
) -> MmdResult<StatewideResult> {
    let mut districts = Vec::with_capacity(partition.num_districts());
    for district in partition.districts() {
        let result = run_district_election(partition, district, model, tabulator, rng)?;
        districts.push(DistrictOutcome {
            district,
            seats: partition.reps(district),
            result,
        });
    }
    let winners: Vec<Candidate> = districts
        .iter()
        .flat_map(|d: &DistrictOutcome| d.result.winners.iter().cloned())
        .collect();
    Ok(StatewideResult {
        districts,
        split: PartySplit::from_winners(&winners),
    })
}

/// The party splits of every map of an ensemble under one voting model and
/// one tabulator.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionsResults {
    pub ensemble_name: String,
    pub voting_model: String,
    pub tabulator: String,
    pub splits: Vec<PartySplit>,
}

impl ElectionsResults {
    /// `{ensemble}-{voting_model}-{tabulator}`
    pub fn name(&self) -> String {
        format!("{}-{}-{}", self.ensemble_name, self.voting_model, self.tabulator)
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.name())
    }

    /// Number of maps for each count of Democratic seats.
    pub fn seat_distribution(&self) -> BTreeMap<u32, usize> {
        let mut res = BTreeMap::new();
        for s in self.splits.iter() {
            *res.entry(s.dem).or_insert(0) += 1;
        }
        res
    }

    pub fn to_file(&self, path: &Path) -> MmdResult<()> {
        let p = path.display().to_string();
        info!("saving elections results to {}", p);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(IoSnafu { path: p.clone() })?;
        }
        let js = serde_json::to_string(self).context(JsonSnafu { path: p.clone() })?;
        fs::write(path, js).context(IoSnafu { path: p })
    }

    pub fn from_file(path: &Path) -> MmdResult<ElectionsResults> {
        let p = path.display().to_string();
        let contents = fs::read_to_string(path).context(IoSnafu { path: p.clone() })?;
        serde_json::from_str(&contents).context(JsonSnafu { path: p })
    }
}

/// One statewide election per map, on the rayon pool. Map `i` draws its
/// ballots from a random source seeded with `base_seed + i`.
pub fn run_ensemble_elections(
    ensemble: &Ensemble,
    model: &dyn VotingModel,
    tabulator: &dyn Tabulator,
    base_seed: u64,
) -> MmdResult<ElectionsResults> {
    info!(
        "running {} statewide elections ({} voting, {} tabulation)",
        ensemble.len(),
        model.name(),
        tabulator.name()
    );
    let splits = ensemble
        .maps
        .par_iter()
        .enumerate()
        .map(|(i, map)| {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
            run_statewide_election(map, model, tabulator, &mut rng).map(|r| r.split)
        })
        .collect::<MmdResult<Vec<PartySplit>>>()?;
    Ok(ElectionsResults {
        ensemble_name: ensemble.name(),
        voting_model: model.name().to_string(),
        tabulator: tabulator.name().to_string(),
        splits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::election::{ComparatorVoting, PartyLineVoting, PluralityTabulator, StvTabulator};
    use crate::graph::{Precinct, PrecinctGraph, VoteTally};
    use crate::partition::test_partitions::striped_grid;
    use std::sync::Arc;

    // Two districts of 3 seats on a path of four precincts.
    fn two_district_map(votes: [(u64, u64); 4]) -> DistrictPartition {
        let precincts = votes
            .iter()
            .enumerate()
            .map(|(i, &(dem, rep))| Precinct {
                id: i as u64,
                population: dem + rep,
                votes: VoteTally { dem, rep },
            })
            .collect();
        let graph = PrecinctGraph::new(precincts, &[(0, 1), (1, 2), (2, 3)]).unwrap();
        let reps = [(1, 3), (2, 3)].into_iter().collect();
        DistrictPartition::new(Arc::new(graph), vec![1, 1, 2, 2], reps).unwrap()
    }

    type Order = fn(Party, &Candidate, &Candidate) -> std::cmp::Ordering;

    // Own party first, then by candidate id.
    fn loyal() -> ComparatorVoting<Order> {
        ComparatorVoting::<Order>::new("loyal", |party: Party, a: &Candidate, b: &Candidate| {
            (a.party != party, a.id).cmp(&(b.party != party, b.id))
        })
    }

    #[test]
    fn party_line_stv_fills_every_seat() {
        let _ = env_logger::builder().is_test(true).try_init();
        let map = two_district_map([(10, 5), (10, 5), (5, 10), (5, 10)]);
        let mut rng = StdRng::seed_from_u64(1);
        let r = run_statewide_election(&map, &PartyLineVoting, &StvTabulator::default(), &mut rng)
            .unwrap();
        assert_eq!(r.districts.len(), 2);
        assert_eq!(r.winners().len(), 6);
        assert_eq!(r.split.total(), 6);
        let by_district = r.winners_by_district();
        assert_eq!(by_district[&1].len(), 3);
        assert!(by_district[&2].iter().all(|c| c.district == 2));
    }

    #[test]
    fn stv_is_proportional() {
        // District 1 votes 2:1 Democratic, district 2 votes 1:2.
        let map = two_district_map([(10, 5), (10, 5), (5, 10), (5, 10)]);
        let mut rng = StdRng::seed_from_u64(1);
        let r = run_statewide_election(&map, &loyal(), &StvTabulator::default(), &mut rng).unwrap();
        let by_district = r.winners_by_district();
        assert_eq!(
            PartySplit::from_winners(&by_district[&1]),
            PartySplit { dem: 2, rep: 1 }
        );
        assert_eq!(
            PartySplit::from_winners(&by_district[&2]),
            PartySplit { dem: 1, rep: 2 }
        );
        assert_eq!(r.split, PartySplit { dem: 3, rep: 3 });
    }

    #[test]
    fn plurality_counts_first_choices() {
        let map = two_district_map([(10, 5), (10, 5), (5, 10), (5, 10)]);
        let mut rng = StdRng::seed_from_u64(1);
        let plurality = PluralityTabulator::default();
        let r = run_statewide_election(&map, &loyal(), &plurality, &mut rng).unwrap();
        // 20 first choices for candidate 1, 10 for candidate 4, then a tie at 0.
        let names: Vec<String> = r.winners_by_district()[&1]
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["Candidate 1", "Candidate 4", "Candidate 2"]);
    }

    #[test]
    fn ensemble_elections_and_distribution() {
        let map = striped_grid(6, 2, 2, &[3, 3, 3]);
        let ensemble = Ensemble {
            maps: vec![map.clone(), map],
            n_recom_steps: 0,
            epsilon: 0.05,
            seed_type: "stripes".to_string(),
            constraints: vec![],
        };
        let stv = StvTabulator::default();
        let results = run_ensemble_elections(&ensemble, &PartyLineVoting, &stv, 3).unwrap();
        assert_eq!(results.splits.len(), 2);
        assert!(results.splits.iter().all(|s| s.total() == 9));
        assert_eq!(results.name(), "stripes-2-none-0-0.05-party_line-stv");
        assert_eq!(results.seat_distribution().values().sum::<usize>(), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(results.file_name());
        results.to_file(&path).unwrap();
        assert_eq!(ElectionsResults::from_file(&path).unwrap(), results);
    }
}
