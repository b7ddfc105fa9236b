//! Random spanning trees by randomized Kruskal: the edge list is shuffled and
//! each edge joining two different components is kept.
//!
//! This does not sample uniformly over all spanning trees, but it is cheap and
//! it is the sampler the recombination step has always used.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::graph::Edge;
use crate::union_find::UnionFind;

/// A spanning tree (or forest) over local node indices `0..n`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SpanningTree {
    adjacency: Vec<Vec<usize>>,
    n_edges: usize,
}

impl SpanningTree {
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn n_edges(&self) -> usize {
        self.n_edges
    }

    /// False if the source graph was disconnected and this is a forest.
    pub fn is_tree(&self) -> bool {
        !self.adjacency.is_empty() && self.n_edges + 1 == self.adjacency.len()
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut res: Vec<Edge> = Vec::with_capacity(self.n_edges);
        for (a, nbs) in self.adjacency.iter().enumerate() {
            for &b in nbs.iter() {
                if a < b {
                    res.push(Edge(a, b));
                }
            }
        }
        res
    }

    /// The nodes reachable from `start` when the tree edge `removed` is cut.
    pub fn component(&self, start: usize, removed: Edge) -> Vec<usize> {
        let mut visited = vec![false; self.adjacency.len()];
        let mut stack = vec![start];
        let mut res = Vec::new();
        visited[start] = true;
        while let Some(node) = stack.pop() {
            res.push(node);
            for &nb in self.adjacency[node].iter() {
                if visited[nb] || Edge::new(node, nb) == removed {
                    continue;
                }
                visited[nb] = true;
                stack.push(nb);
            }
        }
        res.sort_unstable();
        res
    }
}

/// Shuffles `edges` in place and builds the spanning forest they induce over
/// the nodes `0..n`.
pub fn random_spanning_tree<R: Rng + ?Sized>(
    n: usize,
    edges: &mut [Edge],
    rng: &mut R,
) -> SpanningTree {
    edges.shuffle(rng);
    let mut uf = UnionFind::new(n);
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut n_edges = 0;
    for &Edge(a, b) in edges.iter() {
        if n_edges + 1 >= n {
            break;
        }
        if uf.union(a, b) {
            adjacency[a].push(b);
            adjacency[b].push(a);
            n_edges += 1;
        }
    }
    SpanningTree { adjacency, n_edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_graphs::grid;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn is_single_component(tree: &SpanningTree) -> bool {
        let mut uf = UnionFind::new(tree.len());
        for Edge(a, b) in tree.edges() {
            uf.union(a, b);
        }
        (0..tree.len()).all(|i| uf.connected(0, i))
    }

    #[test]
    fn connected_graph_gives_a_tree() {
        let g = grid(6, 5, 1);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut edges = g.edges().to_vec();
            let tree = random_spanning_tree(g.len(), &mut edges, &mut rng);
            assert!(tree.is_tree());
            assert_eq!(tree.n_edges(), g.len() - 1);
            assert_eq!(tree.edges().len(), g.len() - 1);
            assert!(is_single_component(&tree));
            // Every tree edge is a graph edge.
            assert!(tree.edges().iter().all(|e| g.edges().contains(e)));
        }
    }

    #[test]
    fn disconnected_graph_gives_a_forest() {
        // Two triangles with no edge between them.
        let mut edges = vec![
            Edge(0, 1),
            Edge(1, 2),
            Edge(0, 2),
            Edge(3, 4),
            Edge(4, 5),
            Edge(3, 5),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = random_spanning_tree(6, &mut edges, &mut rng);
        assert!(!tree.is_tree());
        assert_eq!(tree.n_edges(), 4);
        assert!(!is_single_component(&tree));
    }

    #[test]
    fn single_node() {
        let tree = random_spanning_tree(1, &mut [], &mut StdRng::seed_from_u64(0));
        assert!(tree.is_tree());
        assert_eq!(tree.n_edges(), 0);
    }

    #[test]
    fn same_seed_same_tree() {
        let g = grid(5, 5, 1);
        let draw = |seed: u64| {
            let mut edges = g.edges().to_vec();
            random_spanning_tree(g.len(), &mut edges, &mut StdRng::seed_from_u64(seed)).edges()
        };
        assert_eq!(draw(42), draw(42));
    }

    #[test]
    fn component_stops_at_removed_edge() {
        // Path 0 - 1 - 2 - 3
        let mut edges = vec![Edge(0, 1), Edge(1, 2), Edge(2, 3)];
        let tree = random_spanning_tree(4, &mut edges, &mut StdRng::seed_from_u64(3));
        assert_eq!(tree.component(0, Edge(1, 2)), vec![0, 1]);
        assert_eq!(tree.component(3, Edge(1, 2)), vec![2, 3]);
    }
}
