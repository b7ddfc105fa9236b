/*!
Ensembles of multi-member district maps and the elections run on them.

The crate generates district maps with the recombination (ReCom) Markov
chain, where every district carries a number of representatives, and
tabulates multi-winner ranked-choice elections (single transferable vote)
in every district of every map.

The main entry points:
- [`graph::PrecinctGraph`] and [`partition::DistrictPartition`] for the
  input data,
- [`seeding::mmd_seed_partition`] to group single-member districts into a
  multi-member seed map,
- [`chain::MarkovChain`] and [`ensemble::EnsembleGenerator`] to walk the
  space of maps,
- [`election::run_ensemble_elections`] and [`builder::Builder`] for the
  elections.

See the [`manual`] for the file formats and the command line program.
*/

mod config;

pub mod builder;
pub mod chain;
pub mod constraints;
pub mod cut;
pub mod election;
pub mod ensemble;
pub mod graph;
pub mod manual;
pub mod partition;
pub mod recom;
pub mod seeding;
pub mod spanning_tree;
pub mod union_find;

pub use crate::config::*;
pub use crate::constraints::{
    CompactnessBound, Constraint, Contiguity, FnConstraint, PopulationBound,
};
pub use crate::ensemble::{Ensemble, EnsembleGenerator, GenerationOutcome};
pub use crate::graph::{DistrictId, Precinct, PrecinctGraph, PrecinctId, VoteTally};
pub use crate::partition::{DistrictPartition, PartitionRecord};
