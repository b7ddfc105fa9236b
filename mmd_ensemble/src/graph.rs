//! The precinct adjacency graph.
//!
//! The graph is built once by a loader and shared read-only (behind an `Arc`)
//! by every partition and every chain. Precincts are addressed internally by
//! their position in the graph (`NodeIndex`); the identifiers used in files
//! (`PrecinctId`) are only translated at the boundaries.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::config::*;

pub type PrecinctId = u64;
pub type DistrictId = u32;
pub type NodeIndex = usize;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub dem: u64,
    pub rep: u64,
}

impl VoteTally {
    pub fn for_party(&self, party: Party) -> u64 {
        match party {
            Party::Democrat => self.dem,
            Party::Republican => self.rep,
        }
    }

    pub fn total(&self) -> u64 {
        self.dem + self.rep
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Precinct {
    pub id: PrecinctId,
    pub population: u64,
    pub votes: VoteTally,
}

/// An undirected edge, stored with the smaller endpoint first.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct Edge(pub NodeIndex, pub NodeIndex);

impl Edge {
    pub fn new(a: NodeIndex, b: NodeIndex) -> Edge {
        if a <= b {
            Edge(a, b)
        } else {
            Edge(b, a)
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrecinctGraph {
    precincts: Vec<Precinct>,
    neighbors: Vec<Vec<NodeIndex>>,
    edges: Vec<Edge>,
    index: HashMap<PrecinctId, NodeIndex>,
}

impl PrecinctGraph {
    /// Builds the graph from its precincts and the adjacency pairs between
    /// precinct ids. Duplicate pairs are merged.
    pub fn new(
        precincts: Vec<Precinct>,
        adjacency: &[(PrecinctId, PrecinctId)],
    ) -> MmdResult<PrecinctGraph> {
        ensure!(!precincts.is_empty(), EmptyGraphSnafu {});
        let mut index: HashMap<PrecinctId, NodeIndex> = HashMap::with_capacity(precincts.len());
        for (idx, p) in precincts.iter().enumerate() {
            ensure!(
                index.insert(p.id, idx).is_none(),
                DuplicatePrecinctSnafu { id: p.id }
            );
        }

        let mut seen: HashSet<Edge> = HashSet::new();
        let mut edges: Vec<Edge> = Vec::new();
        for &(a, b) in adjacency.iter() {
            let (ia, ib) = match (index.get(&a), index.get(&b)) {
                (Some(&ia), Some(&ib)) if ia != ib => (ia, ib),
                _ => return InvalidEdgeSnafu { a, b }.fail(),
            };
            let e = Edge::new(ia, ib);
            if seen.insert(e) {
                edges.push(e);
            }
        }
        edges.sort();

        let mut neighbors: Vec<Vec<NodeIndex>> = vec![Vec::new(); precincts.len()];
        for &Edge(a, b) in edges.iter() {
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        for n in neighbors.iter_mut() {
            n.sort_unstable();
        }

        Ok(PrecinctGraph {
            precincts,
            neighbors,
            edges,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.precincts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precincts.is_empty()
    }

    pub fn precinct(&self, node: NodeIndex) -> &Precinct {
        &self.precincts[node]
    }

    pub fn precincts(&self) -> &[Precinct] {
        &self.precincts
    }

    pub fn population(&self, node: NodeIndex) -> u64 {
        self.precincts[node].population
    }

    pub fn total_population(&self) -> u64 {
        self.precincts.iter().map(|p| p.population).sum()
    }

    pub fn neighbors(&self, node: NodeIndex) -> &[NodeIndex] {
        &self.neighbors[node]
    }

    /// All edges, sorted.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn index_of(&self, id: PrecinctId) -> Option<NodeIndex> {
        self.index.get(&id).copied()
    }

    /// The subgraph induced by `nodes`, renumbered `0..nodes.len()` in the
    /// order given.
    pub fn induced_subgraph(&self, nodes: &[NodeIndex]) -> Subgraph {
        let local: HashMap<NodeIndex, usize> =
            nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        let mut edges: Vec<Edge> = Vec::new();
        for (i, &node) in nodes.iter().enumerate() {
            for nb in self.neighbors[node].iter() {
                if let Some(&j) = local.get(nb) {
                    if i < j {
                        edges.push(Edge(i, j));
                    }
                }
            }
        }
        Subgraph {
            nodes: nodes.to_vec(),
            edges,
            populations: nodes.iter().map(|&n| self.population(n)).collect(),
        }
    }

    /// True if the nodes form a single connected piece of the graph.
    pub fn is_connected(&self, nodes: &[NodeIndex]) -> bool {
        let Some(&start) = nodes.first() else {
            return true;
        };
        let members: HashSet<NodeIndex> = nodes.iter().copied().collect();
        let mut visited: HashSet<NodeIndex> = HashSet::with_capacity(members.len());
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            for &nb in self.neighbors[node].iter() {
                if members.contains(&nb) && visited.insert(nb) {
                    queue.push_back(nb);
                }
            }
        }
        visited.len() == members.len()
    }
}

/// A piece of the precinct graph with local node numbering.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Subgraph {
    /// Local index -> graph node.
    pub nodes: Vec<NodeIndex>,
    /// Edges between local indices.
    pub edges: Vec<Edge>,
    /// Local index -> population.
    pub populations: Vec<u64>,
}

impl Subgraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_population(&self) -> u64 {
        self.populations.iter().sum()
    }
}
