//! The Markov chain driver: repeated ReCom proposals filtered by constraints.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use rand::Rng;

use crate::config::*;
use crate::constraints::Constraint;
use crate::partition::DistrictPartition;
use crate::recom::{check_epsilon, recom_step};

/// A chain over district partitions. Only the current state is kept.
///
/// The chain is an iterator over its accepted states: it yields exactly
/// `n_steps` partitions, or stops after yielding the first error.
pub struct MarkovChain<'a, R: Rng> {
    config: ChainConfig,
    constraints: &'a [Box<dyn Constraint>],
    rng: R,
    state: DistrictPartition,
    completed: usize,
    interrupts: Vec<&'a AtomicBool>,
    done: bool,
}

impl<'a, R: Rng> MarkovChain<'a, R> {
    pub fn new(
        seed: DistrictPartition,
        config: ChainConfig,
        constraints: &'a [Box<dyn Constraint>],
        rng: R,
    ) -> MmdResult<MarkovChain<'a, R>> {
        check_epsilon(config.epsilon)?;
        Ok(MarkovChain {
            config,
            constraints,
            rng,
            state: seed,
            completed: 0,
            interrupts: Vec::new(),
            done: false,
        })
    }

    /// The chain stops with `Interrupted` at the next step boundary once
    /// `flag` is raised. Several flags may be attached; any of them stops it.
    pub fn with_interrupt(mut self, flag: &'a AtomicBool) -> MarkovChain<'a, R> {
        self.interrupts.push(flag);
        self
    }

    pub fn current(&self) -> &DistrictPartition {
        &self.state
    }

    pub fn completed_steps(&self) -> usize {
        self.completed
    }

    /// Runs the remaining steps and returns the final partition.
    pub fn run(mut self) -> MmdResult<DistrictPartition> {
        for state in self.by_ref() {
            state?;
        }
        Ok(self.state)
    }

    fn step(&mut self) -> MmdResult<DistrictPartition> {
        let mut failures = 0;
        let mut trees = 0;
        let mut rejections = 0;
        loop {
            let proposal = match recom_step(
                &self.state,
                self.config.epsilon,
                self.config.tree_attempts,
                &mut self.rng,
            ) {
                Ok(proposal) => proposal,
                Err(MmdError::PartitioningFailure { a, b, attempts }) => {
                    failures += 1;
                    trees += attempts;
                    if failures >= self.config.step_attempts {
                        // Reports the spanning trees drawn over all retries.
                        return PartitioningFailureSnafu {
                            a,
                            b,
                            attempts: trees,
                        }
                        .fail();
                    }
                    warn!(
                        "step {}: no balanced cut of districts {} and {} after {} trees, retrying",
                        self.completed + 1,
                        a,
                        b,
                        attempts
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self
                .constraints
                .iter()
                .find(|c| !c.accepts(&proposal.partition))
            {
                None => return Ok(proposal.partition),
                Some(c) => {
                    rejections += 1;
                    debug!(
                        "step {}: constraint {} rejected the redraw of districts {} and {}",
                        self.completed + 1,
                        c.name(),
                        proposal.a,
                        proposal.b
                    );
                    if rejections >= self.config.max_rejections {
                        return ConstraintsUnsatisfiedSnafu {
                            step: self.completed + 1,
                            proposals: rejections,
                        }
                        .fail();
                    }
                }
            }
        }
    }
}

impl<'a, R: Rng> Iterator for MarkovChain<'a, R> {
    type Item = MmdResult<DistrictPartition>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.completed >= self.config.n_steps {
            return None;
        }
        if self.interrupts.iter().any(|f| f.load(Ordering::Relaxed)) {
            self.done = true;
            return Some(
                InterruptedSnafu {
                    completed: self.completed,
                }
                .fail(),
            );
        }
        match self.step() {
            Ok(next) => {
                self.completed += 1;
                self.state = next.clone();
                Some(Ok(next))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
