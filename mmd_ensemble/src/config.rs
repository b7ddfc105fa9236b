// ********* Errors ***********

use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::graph::{DistrictId, PrecinctId};

/// Errors that prevent the generator or the tabulator from completing.
///
/// Failures inside a retry budget (a spanning tree without a balanced cut, a
/// chain run that hit a partitioning failure) are handled where they occur;
/// only the ones that exhaust their budget reach the caller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MmdError {
    #[snafu(display("the precinct graph has no precincts"))]
    EmptyGraph {},

    #[snafu(display("precinct {id} appears more than once in the graph"))]
    DuplicatePrecinct { id: PrecinctId },

    #[snafu(display("edge ({a}, {b}) references an unknown precinct or is a self-loop"))]
    InvalidEdge { a: PrecinctId, b: PrecinctId },

    #[snafu(display("precinct {id} is not part of the graph"))]
    UnknownPrecinct { id: PrecinctId },

    #[snafu(display("precinct {id} has no district assigned"))]
    UnassignedPrecinct { id: PrecinctId },

    #[snafu(display("expected {expected} district assignments, got {actual}"))]
    AssignmentLength { expected: usize, actual: usize },

    #[snafu(display("district {district} has no representative count"))]
    UnknownDistrict { district: DistrictId },

    #[snafu(display("district {district} has representatives but no precincts"))]
    EmptyDistrict { district: DistrictId },

    #[snafu(display("population tolerance must be in [0, 1), got {epsilon}"))]
    InvalidEpsilon { epsilon: f64 },

    #[snafu(display("the partition has no cut edges: recombination needs two adjacent districts"))]
    NoCutEdges {},

    #[snafu(display(
        "partitioning failed: no cut of districts {a} and {b} met the population range after {attempts} spanning trees"
    ))]
    PartitioningFailure {
        a: DistrictId,
        b: DistrictId,
        attempts: usize,
    },

    #[snafu(display("step {step}: the constraints rejected {proposals} proposals in a row"))]
    ConstraintsUnsatisfied { step: usize, proposals: usize },

    #[snafu(display("map {map} failed after {attempts} chain attempts"))]
    ChainGenerationFailure {
        map: usize,
        attempts: usize,
        #[snafu(source(from(MmdError, Box::new)))]
        source: Box<MmdError>,
    },

    #[snafu(display("interrupted after {completed} completed steps"))]
    Interrupted { completed: usize },

    #[snafu(display("cannot elect {seats} winners among {candidates} candidates"))]
    InvalidSeats { seats: usize, candidates: usize },

    #[snafu(display("candidate {name} is not registered for this election"))]
    UnknownCandidate { name: String },

    #[snafu(display("no allocation of {total_reps} seats into districts of 3 to 5 seats"))]
    NoMmdConfig { total_reps: u32 },

    #[snafu(display(
        "could not group single-member districts into {districts} multi-member districts after {attempts} cut attempts"
    ))]
    SeedAssignmentFailure { districts: usize, attempts: usize },

    #[snafu(display("{seats} seats cannot be filled by {districts} single-member districts"))]
    SeatCountMismatch { seats: usize, districts: usize },

    #[snafu(display("error accessing {path}"))]
    Io {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("error reading or writing JSON for {path}"))]
    Json {
        source: serde_json::Error,
        path: String,
    },
}

pub type MmdResult<T> = Result<T, MmdError>;

// ********* Chain and ensemble configuration **********

/// Number of random spanning trees drawn before a recombination step gives up.
pub const DEFAULT_TREE_ATTEMPTS: usize = 30;

/// Number of times the generation of one ensemble map is restarted from the seed.
pub const DEFAULT_MAP_ATTEMPTS: usize = 10;

/// Number of consecutive proposals the constraints may reject within one step.
pub const DEFAULT_MAX_REJECTIONS: usize = 1000;

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ChainConfig {
    /// Number of accepted recombination steps.
    pub n_steps: usize,
    /// Population tolerance of every split, as a fraction of the target.
    pub epsilon: f64,
    /// Spanning trees drawn per proposal before it fails.
    pub tree_attempts: usize,
    /// Consecutive constraint rejections tolerated within one step.
    pub max_rejections: usize,
    /// Proposals that may fail to partition within one step. With 1, the
    /// first partitioning failure ends the chain run.
    pub step_attempts: usize,
}

impl ChainConfig {
    pub const DEFAULT_CONFIG: ChainConfig = ChainConfig {
        n_steps: 100,
        epsilon: 0.01,
        tree_attempts: DEFAULT_TREE_ATTEMPTS,
        max_rejections: DEFAULT_MAX_REJECTIONS,
        step_attempts: 1,
    };
}

/// What the ensemble generator does when one map exhausts its attempts.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MapFailurePolicy {
    /// Stop the outstanding maps and report the failure.
    Abort,
    /// Record the failed map and keep the others.
    Skip,
}

#[derive(PartialEq, Debug, Clone)]
pub struct EnsembleConfig {
    pub n_maps: usize,
    pub chain: ChainConfig,
    pub map_attempts: usize,
    /// Map `i` derives its random source from this value and `i`.
    pub base_seed: u64,
    /// Label of the seed map the chains start from (e.g. "hr3863").
    pub seed_type: String,
    pub failure_policy: MapFailurePolicy,
}

impl EnsembleConfig {
    pub fn new(n_maps: usize, chain: ChainConfig, seed_type: &str) -> EnsembleConfig {
        EnsembleConfig {
            n_maps,
            chain,
            map_attempts: DEFAULT_MAP_ATTEMPTS,
            base_seed: 0,
            seed_type: seed_type.to_string(),
            failure_policy: MapFailurePolicy::Abort,
        }
    }
}

// ********* Seed map generation **********

/// How one allocation of seats is picked among all the valid ones.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MmdConfigStrategy {
    /// As many 5-seat districts as possible, then as few 4-seat districts
    /// as possible (H.R. 3863, sec. 313).
    Hr3863,
    MaxDistricts,
    MinDistricts,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct SeedParams {
    /// Random spanning trees of the district adjacency graph.
    pub tree_attempts: usize,
    /// Random edge removals tried on each spanning tree.
    pub cut_attempts: usize,
}

impl SeedParams {
    pub const DEFAULT_PARAMS: SeedParams = SeedParams {
        tree_attempts: 20,
        cut_attempts: 100_000,
    };
}

// ********* Election input data structures ***********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Party {
    Democrat,
    Republican,
}

impl Party {
    pub const ALL: [Party; 2] = [Party::Democrat, Party::Republican];
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CandidateId(pub u32);

/// A candidate standing in one district. Candidates are generated per
/// district and per election; they are not shared between districts.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub party: Party,
    pub name: String,
    pub district: DistrictId,
}

// ******** Output data structures *********

/// Weight moved away from one candidate during a round, either because the
/// candidate was eliminated or because it was elected with a surplus.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TransferStats {
    pub name: String,
    pub transfers: Vec<(String, f64)>,
    pub exhausted: f64,
}

/// Statistics for one round
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RoundStats {
    pub round: u32,
    pub tally: Vec<(String, f64)>,
    pub tally_results_elected: Vec<TransferStats>,
    pub tally_results_eliminated: Vec<TransferStats>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionResult {
    /// Exactly as many candidates as there were seats, in order of election.
    pub winners: Vec<Candidate>,
    pub threshold: f64,
    pub round_stats: Vec<RoundStats>,
}

// ********* Tabulation rules **********

/// How an elimination round picks among candidates tied for the lowest tally.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// Eliminate the tied candidate with the lowest id.
    LowestCandidateId,
    /// Eliminate according to a permutation derived from the seed and the
    /// round number. Stable for a given seed.
    Random(u32),
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct StvRules {
    pub tiebreak_mode: TieBreakMode,
}

impl StvRules {
    pub const DEFAULT_RULES: StvRules = StvRules {
        tiebreak_mode: TieBreakMode::LowestCandidateId,
    };
}
