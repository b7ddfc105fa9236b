//! Seed maps for multi-member districts, built by grouping adjacent
//! single-member districts.
//!
//! Every multi-member district has 3 to 5 seats. A seed is obtained by
//! drawing a random spanning tree of the single-member district adjacency
//! graph and removing random tree edges until the pieces have exactly the
//! sizes of the chosen seat allocation.

use std::collections::BTreeMap;

use log::{debug, info};
use rand::seq::index;
use rand::Rng;
use snafu::ensure;

use crate::config::*;
use crate::graph::{DistrictId, Edge};
use crate::partition::{DistrictPartition, DistrictReps};
use crate::spanning_tree::random_spanning_tree;
use crate::union_find::UnionFind;

/// Every allocation of `total_reps` seats into districts of 3, 4 or 5 seats.
///
/// District ids start at 1; the 3-seat districts come first, then the 4-seat
/// ones, then the 5-seat ones. Allocations are listed by increasing number of
/// 3-seat districts, then of 4-seat districts.
pub fn mmd_configs(total_reps: u32) -> Vec<DistrictReps> {
    let mut res = Vec::new();
    for n3 in 0..=total_reps / 3 {
        for n4 in 0..=total_reps / 4 {
            for n5 in 0..=total_reps / 5 {
                if n3 * 3 + n4 * 4 + n5 * 5 != total_reps || n3 + n4 + n5 == 0 {
                    continue;
                }
                let sizes = std::iter::repeat(3)
                    .take(n3 as usize)
                    .chain(std::iter::repeat(4).take(n4 as usize))
                    .chain(std::iter::repeat(5).take(n5 as usize));
                res.push(
                    sizes
                        .enumerate()
                        .map(|(i, s)| (i as DistrictId + 1, s))
                        .collect(),
                );
            }
        }
    }
    res
}

fn count_seats(config: &DistrictReps, seats: u32) -> usize {
    config.values().filter(|&&s| s == seats).count()
}

/// Picks one allocation of `total_reps` seats. Among equally good
/// allocations, the first one listed by `mmd_configs` wins.
pub fn gen_mmd_config(total_reps: u32, strategy: MmdConfigStrategy) -> MmdResult<DistrictReps> {
    let configs = mmd_configs(total_reps);
    let mut best: Option<&DistrictReps> = None;
    for c in configs.iter() {
        let better = match best {
            None => true,
            Some(b) => match strategy {
                MmdConfigStrategy::Hr3863 => {
                    (count_seats(c, 5), std::cmp::Reverse(count_seats(c, 4)))
                        > (count_seats(b, 5), std::cmp::Reverse(count_seats(b, 4)))
                }
                MmdConfigStrategy::MaxDistricts => c.len() > b.len(),
                MmdConfigStrategy::MinDistricts => c.len() < b.len(),
            },
        };
        if better {
            best = Some(c);
        }
    }
    match best {
        Some(config) => {
            info!(
                "using {:?} strategy to pick the seat allocation: {:?}",
                strategy, config
            );
            Ok(config.clone())
        }
        None => NoMmdConfigSnafu { total_reps }.fail(),
    }
}

/// The graph whose nodes are the districts of `partition`, two districts
/// being adjacent when some of their precincts are. Returns the district ids
/// (sorted) and the edges between their positions in that list.
pub fn district_adjacency(partition: &DistrictPartition) -> (Vec<DistrictId>, Vec<Edge>) {
    let districts: Vec<DistrictId> = partition.districts().collect();
    let position: BTreeMap<DistrictId, usize> =
        districts.iter().enumerate().map(|(i, &d)| (d, i)).collect();
    let mut edges: Vec<Edge> = partition
        .cut_edges()
        .iter()
        .map(|&Edge(a, b)| {
            Edge::new(
                position[&partition.district_of(a)],
                position[&partition.district_of(b)],
            )
        })
        .collect();
    edges.sort();
    edges.dedup();
    (districts, edges)
}

/// Groups the single-member districts of `smd` into connected blocks with
/// the seat counts of `config`, one seat per single-member district.
///
/// Returns the multi-member district of every precinct, indexed like the
/// graph nodes.
pub fn mmd_seed_assignment<R: Rng + ?Sized>(
    smd: &DistrictPartition,
    config: &DistrictReps,
    params: &SeedParams,
    rng: &mut R,
) -> MmdResult<Vec<DistrictId>> {
    let (districts, mut edges) = district_adjacency(smd);
    let n = districts.len();
    let k = config.len();
    let mut wanted: Vec<usize> = config.values().map(|&s| s as usize).collect();
    wanted.sort_unstable();

    let seats: usize = wanted.iter().sum();
    ensure!(seats == n, SeatCountMismatchSnafu { seats, districts: n });

    if k > 0 {
        for tree_attempt in 0..params.tree_attempts {
            let tree = random_spanning_tree(n, &mut edges, rng);
            if !tree.is_tree() {
                continue;
            }
            let tree_edges = tree.edges();
            for _ in 0..params.cut_attempts {
                let removed = index::sample(rng, tree_edges.len(), k - 1);
                let mut uf = UnionFind::new(n);
                for (i, &Edge(a, b)) in tree_edges.iter().enumerate() {
                    if !removed.iter().any(|r| r == i) {
                        uf.union(a, b);
                    }
                }
                let labels: Vec<usize> = (0..n).map(|i| uf.find(i)).collect();
                let mut sizes: BTreeMap<usize, usize> = BTreeMap::new();
                for &l in labels.iter() {
                    *sizes.entry(l).or_insert(0) += 1;
                }
                let mut got: Vec<usize> = sizes.values().copied().collect();
                got.sort_unstable();
                if got == wanted {
                    debug!("found the seat allocation on spanning tree {}", tree_attempt + 1);
                    return Ok(assign_blocks(smd, &districts, &labels, config));
                }
            }
        }
    }
    SeedAssignmentFailureSnafu {
        districts: k,
        attempts: params.tree_attempts * params.cut_attempts,
    }
    .fail()
}

// Matches each multi-member district, in id order, with the first unused
// block of its size. Blocks are ordered by their first single-member district.
fn assign_blocks(
    smd: &DistrictPartition,
    districts: &[DistrictId],
    labels: &[usize],
    config: &DistrictReps,
) -> Vec<DistrictId> {
    let mut blocks: Vec<(usize, Vec<usize>)> = Vec::new();
    for (i, &l) in labels.iter().enumerate() {
        match blocks.iter_mut().find(|(label, _)| *label == l) {
            Some((_, members)) => members.push(i),
            None => blocks.push((l, vec![i])),
        }
    }
    let mut used = vec![false; blocks.len()];
    let mut smd_to_mmd: BTreeMap<DistrictId, DistrictId> = BTreeMap::new();
    for (&mmd, &seats) in config.iter() {
        let free = (0..blocks.len()).find(|&b| !used[b] && blocks[b].1.len() == seats as usize);
        if let Some(b) = free {
            used[b] = true;
            for &i in blocks[b].1.iter() {
                smd_to_mmd.insert(districts[i], mmd);
            }
        }
    }
    smd.assignment()
        .iter()
        .map(|d| smd_to_mmd[d])
        .collect()
}

/// The seed partition of multi-member districts built from `smd`, with the
/// seat allocation picked by `strategy`.
pub fn mmd_seed_partition<R: Rng + ?Sized>(
    smd: &DistrictPartition,
    strategy: MmdConfigStrategy,
    params: &SeedParams,
    rng: &mut R,
) -> MmdResult<DistrictPartition> {
    let config = gen_mmd_config(smd.num_districts() as u32, strategy)?;
    let assignment = mmd_seed_assignment(smd, &config, params, rng)?;
    DistrictPartition::new(smd.graph().clone(), assignment, config)
}
