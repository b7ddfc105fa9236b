//! Population-balanced cuts of a spanning tree.

use crate::graph::Edge;
use crate::spanning_tree::SpanningTree;

/// The acceptable population of the target side of a split:
/// `[target * (1 - epsilon), target * (1 + epsilon)]`.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct PopulationRange {
    pub lo: f64,
    pub hi: f64,
}

impl PopulationRange {
    pub fn around(target: f64, epsilon: f64) -> PopulationRange {
        PopulationRange {
            lo: target * (1.0 - epsilon),
            hi: target * (1.0 + epsilon),
        }
    }

    pub fn contains(&self, population: u64) -> bool {
        let p = population as f64;
        self.lo <= p && p <= self.hi
    }
}

/// Which side of the cut edge holds the target population.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CutSide {
    /// The subtree hanging below `node`.
    Subtree,
    /// Everything except that subtree.
    Complement,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct BalancedCut {
    pub node: usize,
    pub parent: usize,
    pub side: CutSide,
}

impl BalancedCut {
    pub fn edge(&self) -> Edge {
        Edge::new(self.node, self.parent)
    }

    /// Removes the cut edge from `tree`: returns the target side first, then
    /// the other side. Both sides are connected.
    pub fn split(&self, tree: &SpanningTree) -> (Vec<usize>, Vec<usize>) {
        let below = tree.component(self.node, self.edge());
        let above = tree.component(self.parent, self.edge());
        match self.side {
            CutSide::Subtree => (below, above),
            CutSide::Complement => (above, below),
        }
    }
}

/// Walks `tree` in post-order from `root`, summing the population of every
/// subtree. The first subtree whose population, or whose complement's
/// population, falls within `range` decides the cut.
///
/// `populations` is indexed like the tree nodes and `total` is their sum.
/// The root itself has no parent edge and is never a cut.
pub fn find_balanced_cut(
    tree: &SpanningTree,
    root: usize,
    populations: &[u64],
    total: u64,
    range: &PopulationRange,
) -> Option<BalancedCut> {
    let mut sums: Vec<u64> = populations.to_vec();
    // (node, parent, index of the next neighbor to visit)
    let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];
    while let Some(frame) = stack.last_mut() {
        let (node, parent, next) = *frame;
        let neighbors = tree.neighbors(node);
        if next < neighbors.len() {
            frame.2 += 1;
            let child = neighbors[next];
            if Some(child) != parent {
                stack.push((child, Some(node), 0));
            }
            continue;
        }
        stack.pop();
        if let Some(parent) = parent {
            let sum = sums[node];
            if range.contains(sum) {
                return Some(BalancedCut {
                    node,
                    parent,
                    side: CutSide::Subtree,
                });
            }
            if range.contains(total.saturating_sub(sum)) {
                return Some(BalancedCut {
                    node,
                    parent,
                    side: CutSide::Complement,
                });
            }
            sums[parent] += sum;
        }
    }
    None
}
