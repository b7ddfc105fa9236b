//! Acceptance constraints for the Markov chain. A proposal is accepted only
//! if every constraint accepts it; there is no soft weighting.

use crate::partition::DistrictPartition;

pub trait Constraint: Send + Sync {
    /// The name recorded in ensembles built under this constraint.
    fn name(&self) -> &str;

    fn accepts(&self, partition: &DistrictPartition) -> bool;
}

/// Every district is connected.
///
/// ReCom proposals are contiguous by construction; this is mostly useful as
/// a check on partitions coming from elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contiguity;

impl Constraint for Contiguity {
    fn name(&self) -> &str {
        "contiguity"
    }

    fn accepts(&self, partition: &DistrictPartition) -> bool {
        partition.is_contiguous()
    }
}

/// Every district holds its seat-weighted share of the state population,
/// within `epsilon`.
#[derive(Debug, Clone, Copy)]
pub struct PopulationBound {
    pub epsilon: f64,
}

impl Constraint for PopulationBound {
    fn name(&self) -> &str {
        "population"
    }

    fn accepts(&self, partition: &DistrictPartition) -> bool {
        let per_rep = partition.ideal_population_per_rep();
        partition.populations().iter().all(|(&district, &pop)| {
            let ideal = per_rep * partition.reps(district) as f64;
            let pop = pop as f64;
            ideal * (1.0 - self.epsilon) <= pop && pop <= ideal * (1.0 + self.epsilon)
        })
    }
}

/// Bounds the number of cut edges, a proxy for the total boundary length.
#[derive(Debug, Clone, Copy)]
pub struct CompactnessBound {
    pub max_cut_edges: usize,
}

impl CompactnessBound {
    /// Allows up to `factor` times the cut edges of `seed`.
    pub fn relative_to(seed: &DistrictPartition, factor: f64) -> CompactnessBound {
        CompactnessBound {
            max_cut_edges: (seed.cut_edges().len() as f64 * factor).floor() as usize,
        }
    }
}

impl Constraint for CompactnessBound {
    fn name(&self) -> &str {
        "compactness"
    }

    fn accepts(&self, partition: &DistrictPartition) -> bool {
        partition.cut_edges().len() <= self.max_cut_edges
    }
}

/// A constraint from a closure.
pub struct FnConstraint<F> {
    name: String,
    predicate: F,
}

impl<F> FnConstraint<F>
where
    F: Fn(&DistrictPartition) -> bool + Send + Sync,
{
    pub fn new(name: &str, predicate: F) -> FnConstraint<F> {
        FnConstraint {
            name: name.to_string(),
            predicate,
        }
    }
}

impl<F> Constraint for FnConstraint<F>
where
    F: Fn(&DistrictPartition) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, partition: &DistrictPartition) -> bool {
        (self.predicate)(partition)
    }
}

pub fn constraint_names(constraints: &[Box<dyn Constraint>]) -> Vec<String> {
    constraints.iter().map(|c| c.name().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::test_partitions::striped_grid;

    #[test]
    fn contiguity() {
        let p = striped_grid(4, 2, 2, &[1, 1]);
        assert!(Contiguity.accepts(&p));
        // Precinct 3 (top right) moves to district 1, which it does not touch.
        let q = p.with_flips(&[(3, 1)]).unwrap();
        assert!(!Contiguity.accepts(&q));
    }

    #[test]
    fn population_bound_uses_seat_weights() {
        // Two stripes of 400 people, with 1 and 3 seats: ideal 200 and 600.
        let p = striped_grid(4, 2, 2, &[1, 3]);
        assert!(!PopulationBound { epsilon: 0.5 }.accepts(&p));
        let q = striped_grid(4, 2, 2, &[2, 2]);
        assert!(PopulationBound { epsilon: 0.0 }.accepts(&q));
        let r = q.with_flips(&[(2, 1)]).unwrap();
        assert!(!PopulationBound { epsilon: 0.2 }.accepts(&r));
        assert!(PopulationBound { epsilon: 0.25 }.accepts(&r));
    }

    #[test]
    fn compactness_relative_to_seed() {
        let seed = striped_grid(4, 2, 2, &[1, 1]);
        assert_eq!(seed.cut_edges().len(), 2);
        let bound = CompactnessBound::relative_to(&seed, 2.0);
        assert_eq!(bound.max_cut_edges, 4);
        assert!(bound.accepts(&seed));
        let tight = CompactnessBound::relative_to(&seed, 0.5);
        assert!(!tight.accepts(&seed));
    }

    #[test]
    fn closures_and_names() {
        let constraints: Vec<Box<dyn Constraint>> = vec![
            Box::new(Contiguity),
            Box::new(FnConstraint::new("two-districts", |p: &DistrictPartition| {
                p.num_districts() == 2
            })),
        ];
        assert_eq!(
            constraint_names(&constraints),
            vec!["contiguity".to_string(), "two-districts".to_string()]
        );
        let p = striped_grid(4, 2, 2, &[1, 1]);
        assert!(constraints.iter().all(|c| c.accepts(&p)));
    }
}
