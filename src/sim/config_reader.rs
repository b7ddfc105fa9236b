use crate::sim::*;

use log::debug;
use mmd_ensemble::election::{
    ComparatorVoting, PartyLineVoting, PluralityTabulator, StvTabulator, Tabulator, VotingModel,
};
use mmd_ensemble::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::prelude::*;
use std::fs;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSource {
    pub file_path: String,
    pub id_column: Option<String>,
    pub population_column: String,
    pub dem_column: String,
    pub rep_column: String,
    pub district_column: Option<String>,
}

fn default_strategy() -> MmdConfigStrategy {
    MmdConfigStrategy::Hr3863
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSettings {
    #[serde(default = "default_strategy")]
    pub strategy: MmdConfigStrategy,
    pub file_path: String,
    pub tree_attempts: Option<usize>,
    pub cut_attempts: Option<usize>,
    pub random_seed: Option<u64>,
}

impl SeedSettings {
    pub fn params(&self) -> SeedParams {
        SeedParams {
            tree_attempts: self
                .tree_attempts
                .unwrap_or(SeedParams::DEFAULT_PARAMS.tree_attempts),
            cut_attempts: self
                .cut_attempts
                .unwrap_or(SeedParams::DEFAULT_PARAMS.cut_attempts),
        }
    }

    /// The label of the seed map in ensemble names.
    pub fn seed_type(&self) -> &'static str {
        match self.strategy {
            MmdConfigStrategy::Hr3863 => "hr3863",
            MmdConfigStrategy::MaxDistricts => "maxDistricts",
            MmdConfigStrategy::MinDistricts => "minDistricts",
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleSettings {
    pub n_maps: usize,
    pub n_steps: usize,
    pub epsilon: f64,
    #[serde(default)]
    pub constraints: Vec<String>,
    pub compactness_factor: Option<f64>,
    pub seed_type: Option<String>,
    pub random_seed: Option<u64>,
    pub tree_attempts: Option<usize>,
    pub map_attempts: Option<usize>,
    pub max_rejections: Option<usize>,
    pub failure_policy: Option<MapFailurePolicy>,
}

impl EnsembleSettings {
    pub fn ensemble_config(&self, seed_type: &str) -> EnsembleConfig {
        let chain = ChainConfig {
            n_steps: self.n_steps,
            epsilon: self.epsilon,
            tree_attempts: self
                .tree_attempts
                .unwrap_or(ChainConfig::DEFAULT_CONFIG.tree_attempts),
            max_rejections: self
                .max_rejections
                .unwrap_or(ChainConfig::DEFAULT_CONFIG.max_rejections),
            ..ChainConfig::DEFAULT_CONFIG
        };
        let mut config = EnsembleConfig::new(self.n_maps, chain, seed_type);
        config.map_attempts = self.map_attempts.unwrap_or(DEFAULT_MAP_ATTEMPTS);
        config.base_seed = self.random_seed.unwrap_or(0);
        config.failure_policy = self.failure_policy.unwrap_or(MapFailurePolicy::Abort);
        config
    }

    /// Resolves the constraint names. The compactness bound is relative to
    /// the seed map.
    pub fn constraints(&self, seed: &DistrictPartition) -> SimResult<Vec<Box<dyn Constraint>>> {
        let mut res: Vec<Box<dyn Constraint>> = Vec::new();
        for name in self.constraints.iter() {
            let c: Box<dyn Constraint> = match name.as_str() {
                "contiguity" => Box::new(Contiguity),
                "population" => Box::new(PopulationBound {
                    epsilon: self.epsilon,
                }),
                "compactness" => Box::new(CompactnessBound::relative_to(
                    seed,
                    self.compactness_factor.unwrap_or(DEFAULT_COMPACTNESS_FACTOR),
                )),
                x => whatever!("unknown constraint: {:?}", x),
            };
            res.push(c);
        }
        Ok(res)
    }
}

/// Cut edges allowed by the compactness constraint, relative to the seed map.
pub const DEFAULT_COMPACTNESS_FACTOR: f64 = 2.0;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSettings {
    pub voting_model: String,
    pub tabulator: String,
    pub tiebreak_mode: Option<String>,
    pub tiebreak_seed: Option<u32>,
    pub random_seed: Option<u64>,
}

impl ElectionSettings {
    pub fn voting_model(&self) -> SimResult<Box<dyn VotingModel>> {
        match self.voting_model.as_str() {
            "partyLine" => Ok(Box::new(PartyLineVoting)),
            "partyOrder" => Ok(Box::new(ComparatorVoting::new(
                "party_order",
                |party: Party, a: &Candidate, b: &Candidate| {
                    (a.party != party, a.id).cmp(&(b.party != party, b.id))
                },
            ))),
            x => whatever!("unknown voting model: {:?}", x),
        }
    }

    pub fn tabulator(&self) -> SimResult<Box<dyn Tabulator>> {
        let rules = validate_rules(self.tiebreak_mode.as_deref(), self.tiebreak_seed)?;
        match self.tabulator.as_str() {
            "stv" => Ok(Box::new(StvTabulator { rules })),
            "plurality" => Ok(Box::new(PluralityTabulator { rules })),
            x => whatever!("unknown tabulator: {:?}", x),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub graph: GraphSource,
    pub seed: Option<SeedSettings>,
    pub ensemble: Option<EnsembleSettings>,
    pub elections: Option<ElectionSettings>,
    pub output_directory: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotCandidate {
    pub name: String,
    pub party: Party,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotEntry {
    pub choices: Vec<String>,
    pub count: Option<u32>,
}

/// The input of `mmdsim tabulate`.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotFile {
    pub seats: usize,
    pub candidates: Vec<BallotCandidate>,
    pub ballots: Vec<BallotEntry>,
    pub tiebreak_mode: Option<String>,
    pub random_seed: Option<u32>,
}

pub fn validate_rules(tiebreak_mode: Option<&str>, seed: Option<u32>) -> SimResult<StvRules> {
    let tiebreak_mode = match tiebreak_mode {
        None | Some("lowestCandidateId") => TieBreakMode::LowestCandidateId,
        Some("random") => match seed {
            Some(x) => TieBreakMode::Random(x),
            None => whatever!("tiebreak mode random requires a random seed"),
        },
        Some(x) => whatever!("Cannot use tiebreak mode {:?}: currently not implemented", x),
    };
    Ok(StvRules { tiebreak_mode })
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> SimResult<T> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
}

pub fn read_summary(path: &str) -> SimResult<JSValue> {
    let js: JSValue = read_json(path)?;
    debug!("read summary: {:?}", js);
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_config_defaults() {
        let js = r#"{
            "graph": {
                "filePath": "g.json",
                "populationColumn": "TOTPOP",
                "demColumn": "D",
                "repColumn": "R"
            },
            "seed": {"filePath": "seed.json"},
            "ensemble": {"nMaps": 4, "nSteps": 10, "epsilon": 0.05, "failurePolicy": "skip"}
        }"#;
        let config: RunConfig = serde_json::from_str(js).unwrap();
        let seed = config.seed.unwrap();
        assert_eq!(seed.strategy, MmdConfigStrategy::Hr3863);
        assert_eq!(seed.params(), SeedParams::DEFAULT_PARAMS);
        let ensemble = config.ensemble.unwrap().ensemble_config("hr3863");
        assert_eq!(ensemble.chain.tree_attempts, DEFAULT_TREE_ATTEMPTS);
        assert_eq!(ensemble.failure_policy, MapFailurePolicy::Skip);
        assert_eq!(ensemble.base_seed, 0);
        assert!(config.elections.is_none());
    }

    #[test]
    fn rules_and_names() {
        assert_eq!(
            validate_rules(Some("random"), Some(3)).unwrap().tiebreak_mode,
            TieBreakMode::Random(3)
        );
        assert!(validate_rules(Some("random"), None).is_err());
        assert!(validate_rules(Some("coinFlip"), None).is_err());

        let settings = ElectionSettings {
            voting_model: "partyOrder".to_string(),
            tabulator: "plurality".to_string(),
            tiebreak_mode: None,
            tiebreak_seed: None,
            random_seed: None,
        };
        assert_eq!(settings.voting_model().unwrap().name(), "party_order");
        assert_eq!(settings.tabulator().unwrap().name(), "plurality");
    }
}
