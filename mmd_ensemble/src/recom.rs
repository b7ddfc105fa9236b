//! The recombination (ReCom) proposal: merge two adjacent districts and split
//! the merged region again along a population-balanced spanning tree cut.

use log::debug;
use rand::Rng;
use snafu::ensure;

use crate::config::*;
use crate::cut::{find_balanced_cut, PopulationRange};
use crate::graph::{DistrictId, NodeIndex, Subgraph};
use crate::partition::DistrictPartition;
use crate::spanning_tree::random_spanning_tree;

/// Two connected node sets splitting a region, the first one holding the
/// target population.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Bipartition {
    pub target_side: Vec<NodeIndex>,
    pub other_side: Vec<NodeIndex>,
    /// Spanning trees drawn until the cut was found.
    pub trees_drawn: usize,
}

/// A successful proposal: districts `a` and `b` were redrawn.
#[derive(Debug, Clone)]
pub struct RecomProposal {
    pub a: DistrictId,
    pub b: DistrictId,
    pub partition: DistrictPartition,
    pub trees_drawn: usize,
}

pub(crate) fn check_epsilon(epsilon: f64) -> MmdResult<()> {
    ensure!(
        (0.0..1.0).contains(&epsilon),
        InvalidEpsilonSnafu { epsilon }
    );
    Ok(())
}

/// Draws up to `attempts` random spanning trees of `sub`, each with a random
/// root, and returns the first population-balanced split found.
///
/// A disconnected region only yields spanning forests; these attempts count
/// as failures. The returned sides are graph node indices, sorted.
pub fn bipartition_tree<R: Rng + ?Sized>(
    sub: &Subgraph,
    pop_target: f64,
    epsilon: f64,
    attempts: usize,
    rng: &mut R,
) -> Option<Bipartition> {
    if sub.len() < 2 {
        return None;
    }
    let range = PopulationRange::around(pop_target, epsilon);
    let total = sub.total_population();
    let mut edges = sub.edges.clone();
    for attempt in 1..=attempts {
        let tree = random_spanning_tree(sub.len(), &mut edges, rng);
        if !tree.is_tree() {
            continue;
        }
        let root = rng.gen_range(0..sub.len());
        if let Some(cut) = find_balanced_cut(&tree, root, &sub.populations, total, &range) {
            let (target, other) = cut.split(&tree);
            let to_graph = |local: Vec<usize>| {
                let mut nodes: Vec<NodeIndex> = local.into_iter().map(|i| sub.nodes[i]).collect();
                nodes.sort_unstable();
                nodes
            };
            return Some(Bipartition {
                target_side: to_graph(target),
                other_side: to_graph(other),
                trees_drawn: attempt,
            });
        }
    }
    None
}

/// One ReCom proposal.
///
/// Picks a cut edge uniformly at random, merges the two districts it
/// straddles and splits them again so that the first district receives its
/// seat-weighted share of the merged population, within `epsilon`. Every
/// other district keeps its precincts, and all districts keep their seats.
///
/// Fails with `PartitioningFailure` when none of the `tree_attempts`
/// spanning trees has a balanced cut. The failure is retryable.
pub fn recom_step<R: Rng + ?Sized>(
    partition: &DistrictPartition,
    epsilon: f64,
    tree_attempts: usize,
    rng: &mut R,
) -> MmdResult<RecomProposal> {
    check_epsilon(epsilon)?;
    let cut_edges = partition.cut_edges();
    ensure!(!cut_edges.is_empty(), NoCutEdgesSnafu {});

    let edge = cut_edges[rng.gen_range(0..cut_edges.len())];
    let a = partition.district_of(edge.0);
    let b = partition.district_of(edge.1);

    let mut nodes: Vec<NodeIndex> = partition.part(a).to_vec();
    nodes.extend_from_slice(partition.part(b));
    let sub = partition.graph().induced_subgraph(&nodes);

    let (reps_a, reps_b) = (partition.reps(a), partition.reps(b));
    let pop_target = reps_a as f64 / (reps_a + reps_b) as f64 * sub.total_population() as f64;

    let split = match bipartition_tree(&sub, pop_target, epsilon, tree_attempts, rng) {
        Some(split) => split,
        None => {
            return PartitioningFailureSnafu {
                a,
                b,
                attempts: tree_attempts,
            }
            .fail()
        }
    };
    debug!(
        "recom: merged districts {} and {} ({} precincts, target population {:.1}), split after {} trees",
        a,
        b,
        sub.len(),
        pop_target,
        split.trees_drawn
    );

    let mut assignment = partition.assignment().to_vec();
    for &node in split.target_side.iter() {
        assignment[node] = a;
    }
    for &node in split.other_side.iter() {
        assignment[node] = b;
    }
    Ok(RecomProposal {
        a,
        b,
        partition: partition.with_assignment(assignment)?,
        trees_drawn: split.trees_drawn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_graphs::path;
    use crate::partition::test_partitions::striped_grid;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn steps_keep_districts_contiguous_and_seats_fixed() {
        init();
        let seed = striped_grid(8, 6, 2, &[1, 1, 1, 1]);
        let reps = seed.district_reps().clone();
        let mut rng = StdRng::seed_from_u64(11);
        let mut current = seed;
        let mut accepted = 0;
        for _ in 0..100 {
            match recom_step(&current, 0.1, 30, &mut rng) {
                Ok(p) => {
                    current = p.partition;
                    accepted += 1;
                }
                Err(MmdError::PartitioningFailure { .. }) => continue,
                Err(e) => panic!("unexpected error: {}", e),
            }
            assert!(current.is_contiguous());
            assert_eq!(current.district_reps(), &reps);
            assert_eq!(current.assignment().len(), current.graph().len());
            assert_eq!(current.num_districts(), 4);
        }
        assert!(accepted > 50);
    }

    #[test]
    fn split_respects_seat_weighted_target() {
        init();
        // Districts of 1, 2 and 1 seats; the middle one starts with double width.
        let graph = Arc::new(crate::graph::test_graphs::grid(8, 4, 100));
        let assignment = (0..32u64)
            .map(|id| match id % 8 {
                0 | 1 => 1,
                2..=5 => 2,
                _ => 3,
            })
            .collect();
        let reps: BTreeMap<DistrictId, u32> = [(1, 1), (2, 2), (3, 1)].into_iter().collect();
        let mut current = DistrictPartition::new(graph, assignment, reps).unwrap();
        let epsilon = 0.05;
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..60 {
            let proposal = match recom_step(&current, epsilon, 50, &mut rng) {
                Ok(p) => p,
                Err(MmdError::PartitioningFailure { .. }) => continue,
                Err(e) => panic!("unexpected error: {}", e),
            };
            let (a, b) = (proposal.a, proposal.b);
            let combined = (current.population(a) + current.population(b)) as f64;
            let f = current.reps(a) as f64 / (current.reps(a) + current.reps(b)) as f64;
            let pop_a = proposal.partition.population(a) as f64;
            assert!(pop_a >= f * combined * (1.0 - epsilon));
            assert!(pop_a <= f * combined * (1.0 + epsilon));
            // Only a and b changed.
            for node in 0..current.graph().len() {
                let before = current.district_of(node);
                if before != a && before != b {
                    assert_eq!(proposal.partition.district_of(node), before);
                }
            }
            current = proposal.partition;
        }
    }

    #[test]
    fn same_seed_same_chain() {
        let seed = striped_grid(6, 6, 2, &[1, 1, 1]);
        let run = |s: u64| {
            let mut rng = StdRng::seed_from_u64(s);
            let mut current = seed.clone();
            for _ in 0..20 {
                if let Ok(p) = recom_step(&current, 0.1, 30, &mut rng) {
                    current = p.partition;
                }
            }
            current
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn single_district_has_no_cut_edges() {
        let graph = Arc::new(path(&[1, 1, 1]));
        let reps = [(1, 3)].into_iter().collect();
        let p = DistrictPartition::new(graph, vec![1, 1, 1], reps).unwrap();
        let err = recom_step(&p, 0.1, 10, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, MmdError::NoCutEdges {}));
    }

    #[test]
    fn unbalanced_region_fails_to_partition() {
        // 1 - 1 - 10: no cut gives a 6 / 6 split.
        let graph = Arc::new(path(&[1, 1, 10]));
        let reps = [(1, 1), (2, 1)].into_iter().collect();
        let p = DistrictPartition::new(graph, vec![1, 1, 2], reps).unwrap();
        let err = recom_step(&p, 0.01, 7, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(
            err,
            MmdError::PartitioningFailure { a: 1, b: 2, attempts: 7 }
        ));
    }

    #[test]
    fn rejects_invalid_epsilon() {
        let p = striped_grid(4, 2, 2, &[1, 1]);
        let err = recom_step(&p, 1.5, 10, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, MmdError::InvalidEpsilon { .. }));
    }
}
