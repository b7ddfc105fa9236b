//! Ensembles of district maps and their parallel generation.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use snafu::{IntoError, ResultExt};

use crate::chain::MarkovChain;
use crate::config::*;
use crate::constraints::{constraint_names, Constraint};
use crate::graph::PrecinctGraph;
use crate::partition::{DistrictPartition, PartitionRecord};
use crate::recom::check_epsilon;

/// The serialized form of an ensemble.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleRecord {
    pub maps: Vec<PartitionRecord>,
    pub n_recom_steps: usize,
    pub epsilon: f64,
    pub seed_type: String,
    pub constraints: Vec<String>,
}

/// Independently sampled maps and the parameters that produced them.
#[derive(PartialEq, Debug, Clone)]
pub struct Ensemble {
    pub maps: Vec<DistrictPartition>,
    pub n_recom_steps: usize,
    pub epsilon: f64,
    pub seed_type: String,
    pub constraints: Vec<String>,
}

impl Ensemble {
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// `{seed_type}-{n_maps}-{constraints}-{n_recom_steps}-{epsilon}`
    pub fn name(&self) -> String {
        ensemble_name(
            &self.seed_type,
            self.maps.len(),
            &self.constraints,
            self.n_recom_steps,
            self.epsilon,
        )
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.name())
    }

    pub fn to_record(&self) -> EnsembleRecord {
        EnsembleRecord {
            maps: self.maps.iter().map(|m| m.to_record()).collect(),
            n_recom_steps: self.n_recom_steps,
            epsilon: self.epsilon,
            seed_type: self.seed_type.clone(),
            constraints: self.constraints.clone(),
        }
    }

    pub fn from_record(graph: Arc<PrecinctGraph>, record: &EnsembleRecord) -> MmdResult<Ensemble> {
        let maps = record
            .maps
            .iter()
            .map(|m| DistrictPartition::from_record(graph.clone(), m))
            .collect::<MmdResult<Vec<DistrictPartition>>>()?;
        Ok(Ensemble {
            maps,
            n_recom_steps: record.n_recom_steps,
            epsilon: record.epsilon,
            seed_type: record.seed_type.clone(),
            constraints: record.constraints.clone(),
        })
    }

    pub fn to_file(&self, path: &Path) -> MmdResult<()> {
        let p = path.display().to_string();
        info!("saving ensemble of {} maps to {}", self.maps.len(), p);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(IoSnafu { path: p.clone() })?;
        }
        let js = serde_json::to_string(&self.to_record()).context(JsonSnafu { path: p.clone() })?;
        fs::write(path, js).context(IoSnafu { path: p })
    }

    pub fn from_file(graph: Arc<PrecinctGraph>, path: &Path) -> MmdResult<Ensemble> {
        let p = path.display().to_string();
        info!("loading ensemble from {}", p);
        let contents = fs::read_to_string(path).context(IoSnafu { path: p.clone() })?;
        let record: EnsembleRecord =
            serde_json::from_str(&contents).context(JsonSnafu { path: p })?;
        Ensemble::from_record(graph, &record)
    }
}

/// The name of an ensemble with these parameters. Constraint names are
/// joined with `+`, or replaced by `none`.
pub fn ensemble_name(
    seed_type: &str,
    n_maps: usize,
    constraints: &[String],
    n_recom_steps: usize,
    epsilon: f64,
) -> String {
    let constraints = if constraints.is_empty() {
        "none".to_string()
    } else {
        constraints.join("+")
    };
    format!(
        "{}-{}-{}-{}-{}",
        seed_type, n_maps, constraints, n_recom_steps, epsilon
    )
}

/// The result of a generation run that was not aborted.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Completed maps, in map index order.
    pub ensemble: Ensemble,
    /// Indices of the maps that exhausted their attempts (skip policy only).
    pub failed_maps: Vec<usize>,
    /// True if generation stopped early on the interrupt flag.
    pub interrupted: bool,
}

enum MapOutcome {
    Done(DistrictPartition),
    Failed(MmdError),
    Stopped,
}

/// The random seed of attempt `attempt` of map `map`.
pub fn map_seed(base_seed: u64, map: usize, attempt: usize) -> u64 {
    base_seed
        .wrapping_add(map as u64)
        .wrapping_add((attempt as u64) << 32)
}

/// Runs one Markov chain per map on the rayon pool, all from the same seed
/// partition. Map `i` only depends on the seed partition, the configuration
/// and `map_seed(base_seed, i, attempt)`.
pub struct EnsembleGenerator<'a> {
    config: EnsembleConfig,
    constraints: &'a [Box<dyn Constraint>],
    interrupt: Option<&'a AtomicBool>,
}

impl<'a> EnsembleGenerator<'a> {
    pub fn new(
        config: EnsembleConfig,
        constraints: &'a [Box<dyn Constraint>],
    ) -> EnsembleGenerator<'a> {
        EnsembleGenerator {
            config,
            constraints,
            interrupt: None,
        }
    }

    /// Raising `flag` stops every chain at its next step boundary. The maps
    /// completed so far are still returned.
    pub fn with_interrupt(mut self, flag: &'a AtomicBool) -> EnsembleGenerator<'a> {
        self.interrupt = Some(flag);
        self
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn generate(&self, seed: &DistrictPartition) -> MmdResult<GenerationOutcome> {
        check_epsilon(self.config.chain.epsilon)?;
        info!(
            "generating {} maps of {} recom steps (epsilon {}, constraints {:?})",
            self.config.n_maps,
            self.config.chain.n_steps,
            self.config.chain.epsilon,
            constraint_names(self.constraints)
        );
        let abort = AtomicBool::new(false);
        let outcomes: Vec<MapOutcome> = (0..self.config.n_maps)
            .into_par_iter()
            .map(|i| self.generate_map(seed, i, &abort))
            .collect();

        let mut maps: Vec<DistrictPartition> = Vec::with_capacity(outcomes.len());
        let mut failed_maps: Vec<usize> = Vec::new();
        let mut first_failure: Option<MmdError> = None;
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                MapOutcome::Done(p) => maps.push(p),
                MapOutcome::Failed(e) => match self.config.failure_policy {
                    MapFailurePolicy::Abort => {
                        if first_failure.is_none() {
                            first_failure = Some(e);
                        }
                    }
                    MapFailurePolicy::Skip => {
                        warn!("skipping map {}: {}", i, e);
                        failed_maps.push(i);
                    }
                },
                MapOutcome::Stopped => {}
            }
        }
        if let Some(e) = first_failure {
            return Err(e);
        }
        let interrupted = self.interrupted();
        if interrupted {
            warn!(
                "interrupted: {} of {} maps completed",
                maps.len(),
                self.config.n_maps
            );
        }
        Ok(GenerationOutcome {
            ensemble: Ensemble {
                maps,
                n_recom_steps: self.config.chain.n_steps,
                epsilon: self.config.chain.epsilon,
                seed_type: self.config.seed_type.clone(),
                constraints: constraint_names(self.constraints),
            },
            failed_maps,
            interrupted,
        })
    }

    fn interrupted(&self) -> bool {
        self.interrupt.map_or(false, |f| f.load(Ordering::Relaxed))
    }

    fn generate_map(&self, seed: &DistrictPartition, map: usize, abort: &AtomicBool) -> MapOutcome {
        let attempts = self.config.map_attempts.max(1);
        let mut last_error: Option<MmdError> = None;
        for attempt in 0..attempts {
            if self.interrupted() || abort.load(Ordering::Relaxed) {
                return MapOutcome::Stopped;
            }
            let rng = StdRng::seed_from_u64(map_seed(self.config.base_seed, map, attempt));
            let chain = MarkovChain::new(seed.clone(), self.config.chain, self.constraints, rng);
            let chain = match chain {
                Ok(chain) => chain.with_interrupt(abort),
                Err(e) => return MapOutcome::Failed(e),
            };
            let chain = match self.interrupt {
                Some(flag) => chain.with_interrupt(flag),
                None => chain,
            };
            match chain.run() {
                Ok(p) => {
                    info!("generated map {} after {} attempts", map, attempt + 1);
                    return MapOutcome::Done(p);
                }
                Err(MmdError::Interrupted { .. }) => return MapOutcome::Stopped,
                Err(e) => {
                    warn!("map {}, attempt {}: {}", map, attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }
        let failure = ChainGenerationFailureSnafu { map, attempts }.into_error(
            last_error.unwrap_or(MmdError::Interrupted { completed: 0 }),
        );
        if self.config.failure_policy == MapFailurePolicy::Abort {
            abort.store(true, Ordering::Relaxed);
        }
        MapOutcome::Failed(failure)
    }
}
