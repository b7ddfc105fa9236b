//! District partitions: an assignment of every precinct to a district, with
//! the seat count of each district.
//!
//! A partition is an immutable record. Every reassignment produces a new
//! record whose derived views (district membership, populations, cut edges)
//! are recomputed at construction.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt, ResultExt};

use crate::config::*;
use crate::graph::{DistrictId, Edge, NodeIndex, PrecinctGraph, PrecinctId};

/// Number of representatives elected by each district.
pub type DistrictReps = BTreeMap<DistrictId, u32>;

/// The serialized form of a partition. The graph is reattached by the loader.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub assignment: BTreeMap<PrecinctId, DistrictId>,
    pub district_reps: DistrictReps,
}

impl PartitionRecord {
    pub fn from_file(path: &Path) -> MmdResult<PartitionRecord> {
        let p = path.display().to_string();
        info!("loading partition from {}", p);
        let contents = fs::read_to_string(path).context(IoSnafu { path: p.clone() })?;
        serde_json::from_str(&contents).context(JsonSnafu { path: p })
    }

    pub fn to_file(&self, path: &Path) -> MmdResult<()> {
        let p = path.display().to_string();
        info!("saving partition to {}", p);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(IoSnafu { path: p.clone() })?;
        }
        let js = serde_json::to_string(self).context(JsonSnafu { path: p.clone() })?;
        fs::write(path, js).context(IoSnafu { path: p })
    }
}

#[derive(Debug, Clone)]
pub struct DistrictPartition {
    graph: Arc<PrecinctGraph>,
    assignment: Vec<DistrictId>,
    district_reps: Arc<DistrictReps>,
    // Derived views.
    parts: BTreeMap<DistrictId, Vec<NodeIndex>>,
    populations: BTreeMap<DistrictId, u64>,
    cut_edges: Vec<Edge>,
}

impl DistrictPartition {
    /// `assignment[i]` is the district of the precinct at node index `i`.
    pub fn new(
        graph: Arc<PrecinctGraph>,
        assignment: Vec<DistrictId>,
        district_reps: DistrictReps,
    ) -> MmdResult<DistrictPartition> {
        Self::build(graph, assignment, Arc::new(district_reps))
    }

    fn build(
        graph: Arc<PrecinctGraph>,
        assignment: Vec<DistrictId>,
        district_reps: Arc<DistrictReps>,
    ) -> MmdResult<DistrictPartition> {
        ensure!(
            assignment.len() == graph.len(),
            AssignmentLengthSnafu {
                expected: graph.len(),
                actual: assignment.len(),
            }
        );
        let mut parts: BTreeMap<DistrictId, Vec<NodeIndex>> = BTreeMap::new();
        let mut populations: BTreeMap<DistrictId, u64> = BTreeMap::new();
        for (node, &district) in assignment.iter().enumerate() {
            ensure!(
                district_reps.contains_key(&district),
                UnknownDistrictSnafu { district }
            );
            parts.entry(district).or_default().push(node);
            *populations.entry(district).or_insert(0) += graph.population(node);
        }
        for &district in district_reps.keys() {
            ensure!(parts.contains_key(&district), EmptyDistrictSnafu { district });
        }
        let cut_edges: Vec<Edge> = graph
            .edges()
            .iter()
            .filter(|Edge(a, b)| assignment[*a] != assignment[*b])
            .copied()
            .collect();
        Ok(DistrictPartition {
            graph,
            assignment,
            district_reps,
            parts,
            populations,
            cut_edges,
        })
    }

    /// Attaches a serialized partition to its graph. Every precinct of the
    /// graph must be assigned, and only precincts of the graph.
    pub fn from_record(
        graph: Arc<PrecinctGraph>,
        record: &PartitionRecord,
    ) -> MmdResult<DistrictPartition> {
        for id in record.assignment.keys() {
            ensure!(graph.index_of(*id).is_some(), UnknownPrecinctSnafu { id: *id });
        }
        let mut assignment: Vec<DistrictId> = Vec::with_capacity(graph.len());
        for p in graph.precincts() {
            let district = record
                .assignment
                .get(&p.id)
                .context(UnassignedPrecinctSnafu { id: p.id })?;
            assignment.push(*district);
        }
        Self::new(graph, assignment, record.district_reps.clone())
    }

    pub fn to_record(&self) -> PartitionRecord {
        PartitionRecord {
            assignment: self
                .graph
                .precincts()
                .iter()
                .zip(self.assignment.iter())
                .map(|(p, &d)| (p.id, d))
                .collect(),
            district_reps: (*self.district_reps).clone(),
        }
    }

    pub fn from_file(graph: Arc<PrecinctGraph>, path: &Path) -> MmdResult<DistrictPartition> {
        Self::from_record(graph, &PartitionRecord::from_file(path)?)
    }

    pub fn to_file(&self, path: &Path) -> MmdResult<()> {
        self.to_record().to_file(path)
    }

    /// A new partition over the same graph and seat counts.
    pub fn with_assignment(&self, assignment: Vec<DistrictId>) -> MmdResult<DistrictPartition> {
        Self::build(self.graph.clone(), assignment, self.district_reps.clone())
    }

    /// A new partition where each listed node moves to the given district.
    pub fn with_flips(&self, flips: &[(NodeIndex, DistrictId)]) -> MmdResult<DistrictPartition> {
        let mut assignment = self.assignment.clone();
        for &(node, district) in flips.iter() {
            assignment[node] = district;
        }
        self.with_assignment(assignment)
    }

    pub fn graph(&self) -> &Arc<PrecinctGraph> {
        &self.graph
    }

    pub fn assignment(&self) -> &[DistrictId] {
        &self.assignment
    }

    pub fn district_of(&self, node: NodeIndex) -> DistrictId {
        self.assignment[node]
    }

    pub fn district_reps(&self) -> &DistrictReps {
        &self.district_reps
    }

    /// Seats of `district`, 0 for a district not in this partition.
    pub fn reps(&self, district: DistrictId) -> u32 {
        self.district_reps.get(&district).copied().unwrap_or(0)
    }

    pub fn total_reps(&self) -> u32 {
        self.district_reps.values().sum()
    }

    pub fn num_districts(&self) -> usize {
        self.district_reps.len()
    }

    pub fn districts(&self) -> impl Iterator<Item = DistrictId> + '_ {
        self.district_reps.keys().copied()
    }

    /// The nodes of `district`, in increasing order.
    pub fn part(&self, district: DistrictId) -> &[NodeIndex] {
        self.parts.get(&district).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn parts(&self) -> &BTreeMap<DistrictId, Vec<NodeIndex>> {
        &self.parts
    }

    pub fn population(&self, district: DistrictId) -> u64 {
        self.populations.get(&district).copied().unwrap_or(0)
    }

    pub fn populations(&self) -> &BTreeMap<DistrictId, u64> {
        &self.populations
    }

    /// Graph edges whose endpoints lie in different districts, sorted.
    pub fn cut_edges(&self) -> &[Edge] {
        &self.cut_edges
    }

    /// Population per representative if the whole state were perfectly balanced.
    pub fn ideal_population_per_rep(&self) -> f64 {
        self.graph.total_population() as f64 / self.total_reps().max(1) as f64
    }

    /// True if every district is a single connected piece.
    pub fn is_contiguous(&self) -> bool {
        self.parts.values().all(|nodes| self.graph.is_connected(nodes))
    }
}

/// Partitions are equal when they assign the same districts and seats.
impl PartialEq for DistrictPartition {
    fn eq(&self, other: &DistrictPartition) -> bool {
        self.assignment == other.assignment && self.district_reps == other.district_reps
    }
}

#[cfg(test)]
pub(crate) mod test_partitions {
    use super::*;
    use crate::graph::test_graphs::grid;

    /// A `width` x `height` grid split into vertical stripes of `stripe`
    /// columns, district ids from 1, with the given seats per district.
    pub fn striped_grid(width: u64, height: u64, stripe: u64, reps: &[u32]) -> DistrictPartition {
        let graph = Arc::new(grid(width, height, 100));
        let assignment = (0..width * height)
            .map(|id| ((id % width) / stripe) as DistrictId + 1)
            .collect();
        let district_reps = reps
            .iter()
            .enumerate()
            .map(|(i, &r)| (i as DistrictId + 1, r))
            .collect();
        DistrictPartition::new(graph, assignment, district_reps).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_partitions::striped_grid;
    use super::*;
    use crate::graph::test_graphs::grid;

    #[test]
    fn derived_views() {
        // 4 x 2 grid, two stripes of two columns.
        let p = striped_grid(4, 2, 2, &[3, 5]);
        assert_eq!(p.part(1), &[0, 1, 4, 5]);
        assert_eq!(p.part(2), &[2, 3, 6, 7]);
        assert_eq!(p.population(1), 400);
        assert_eq!(p.total_reps(), 8);
        assert_eq!(p.reps(2), 5);
        // The stripes touch along column 1 / 2 on both rows.
        assert_eq!(p.cut_edges(), &[Edge(1, 2), Edge(5, 6)]);
        assert!(p.is_contiguous());
        assert_eq!(p.ideal_population_per_rep(), 100.0);
    }

    #[test]
    fn validates_assignment() {
        let graph = Arc::new(grid(2, 1, 1));
        let reps: DistrictReps = [(1, 1), (2, 1)].into_iter().collect();
        let err = DistrictPartition::new(graph.clone(), vec![1], reps.clone()).unwrap_err();
        assert!(matches!(err, MmdError::AssignmentLength { expected: 2, actual: 1 }));
        let err = DistrictPartition::new(graph.clone(), vec![1, 3], reps.clone()).unwrap_err();
        assert!(matches!(err, MmdError::UnknownDistrict { district: 3 }));
        let err = DistrictPartition::new(graph, vec![1, 1], reps).unwrap_err();
        assert!(matches!(err, MmdError::EmptyDistrict { district: 2 }));
    }

    #[test]
    fn record_rejects_unknown_and_missing_precincts() {
        let graph = Arc::new(grid(2, 1, 1));
        let reps: DistrictReps = [(1, 2)].into_iter().collect();
        let record = PartitionRecord {
            assignment: [(0, 1), (1, 1), (9, 1)].into_iter().collect(),
            district_reps: reps.clone(),
        };
        let err = DistrictPartition::from_record(graph.clone(), &record).unwrap_err();
        assert!(matches!(err, MmdError::UnknownPrecinct { id: 9 }));

        let record = PartitionRecord {
            assignment: [(0, 1)].into_iter().collect(),
            district_reps: reps,
        };
        let err = DistrictPartition::from_record(graph, &record).unwrap_err();
        assert!(matches!(err, MmdError::UnassignedPrecinct { id: 1 }));
    }

    #[test]
    fn file_round_trip() {
        let p = striped_grid(6, 3, 2, &[3, 4, 5]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds").join("seed.json");
        p.to_file(&path).unwrap();
        let q = DistrictPartition::from_file(p.graph().clone(), &path).unwrap();
        assert_eq!(p, q);
        assert_eq!(q.district_reps(), p.district_reps());
    }

    #[test]
    fn with_flips_recomputes_views() {
        let p = striped_grid(4, 1, 2, &[1, 1]);
        let q = p.with_flips(&[(2, 1)]).unwrap();
        assert_eq!(q.part(1), &[0, 1, 2]);
        assert_eq!(q.population(2), 100);
        assert_eq!(q.cut_edges(), &[Edge(2, 3)]);
        // The original is untouched.
        assert_eq!(p.part(1), &[0, 1]);
    }
}
