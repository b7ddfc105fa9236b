use log::{info, warn};

use mmd_ensemble::builder::Builder;
use mmd_ensemble::election::run_ensemble_elections;
use mmd_ensemble::ensemble::ensemble_name;
use mmd_ensemble::seeding::mmd_seed_partition;
use mmd_ensemble::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::sim::config_reader::*;
use crate::sim::io_graph::{read_graph, GraphData};

pub mod config_reader;
pub mod io_graph;

#[derive(Debug, Snafu)]
pub enum SimError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON from {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Node {node} has no usable value in column {column}"))]
    MissingColumn { node: usize, column: String },
    #[snafu(display("The run configuration has no '{section}' section"))]
    MissingSection { section: String },
    #[snafu(display("{source}"))]
    Mmd { source: MmdError },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SimResult<T> = Result<T, SimError>;

// The directory against which the relative paths of a run file are resolved.
fn config_root(config_path: &str) -> PathBuf {
    Path::new(config_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

fn read_run_config(config_path: &str) -> SimResult<(RunConfig, PathBuf)> {
    let config: RunConfig = read_json(config_path)?;
    info!("config: {:?}", config);
    Ok((config, config_root(config_path)))
}

fn load_graph(config: &RunConfig, root: &Path) -> SimResult<GraphData> {
    let p = root.join(&config.graph.file_path);
    read_graph(&p.display().to_string(), &config.graph)
}

fn output_dir(config: &RunConfig, root: &Path, out: Option<String>) -> PathBuf {
    match out {
        Some(x) => PathBuf::from(x),
        None => root.join(config.output_directory.as_deref().unwrap_or(".")),
    }
}

fn seed_settings(config: &RunConfig) -> SimResult<&SeedSettings> {
    config
        .seed
        .as_ref()
        .context(MissingSectionSnafu { section: "seed" })
}

/// Builds the multi-member seed map from the single-member districts of the
/// graph.
pub fn run_seed(config_path: &str, out: Option<String>) -> SimResult<()> {
    let (config, root) = read_run_config(config_path)?;
    let settings = seed_settings(&config)?;
    let data = load_graph(&config, &root)?;
    let assignment = match data.districts {
        Some(x) => x,
        None => whatever!("the seed map needs the 'districtColumn' of the graph"),
    };
    let reps: BTreeMap<DistrictId, u32> = assignment.iter().map(|d| (*d, 1)).collect();
    let smd = DistrictPartition::new(Arc::new(data.graph), assignment, reps).context(MmdSnafu)?;
    info!(
        "{} precincts in {} single-member districts",
        smd.graph().len(),
        smd.num_districts()
    );

    let mut rng = StdRng::seed_from_u64(settings.random_seed.unwrap_or(0));
    let mmd = mmd_seed_partition(&smd, settings.strategy, &settings.params(), &mut rng)
        .context(MmdSnafu)?;
    for (district, seats) in mmd.district_reps().iter() {
        info!(
            "district {}: {} seats, population {}",
            district,
            seats,
            mmd.population(*district)
        );
    }

    let path = match out {
        Some(x) => PathBuf::from(x),
        None => root.join(&settings.file_path),
    };
    mmd.to_file(&path).context(MmdSnafu)
}

// Raises the flag once the time limit has passed. The thread is detached:
// it dies with the process if generation finishes first.
fn spawn_watchdog(flag: Arc<AtomicBool>, seconds: u64) {
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(seconds));
        warn!("time limit of {}s reached, stopping generation", seconds);
        flag.store(true, Ordering::SeqCst);
    });
}

/// Generates an ensemble from the seed map. Maps completed before the time
/// limit are written even if the ensemble is not complete.
pub fn run_ensemble(
    config_path: &str,
    seed_path: Option<String>,
    out: Option<String>,
    time_limit: Option<u64>,
) -> SimResult<()> {
    let (config, root) = read_run_config(config_path)?;
    let settings = config
        .ensemble
        .as_ref()
        .context(MissingSectionSnafu { section: "ensemble" })?;
    let graph = Arc::new(load_graph(&config, &root)?.graph);
    let seed_path = match seed_path {
        Some(x) => PathBuf::from(x),
        None => root.join(&seed_settings(&config)?.file_path),
    };
    let seed = DistrictPartition::from_file(graph, &seed_path).context(MmdSnafu)?;

    let seed_type = ensemble_seed_type(&config);
    let constraints = settings.constraints(&seed)?;
    let interrupt = Arc::new(AtomicBool::new(false));
    if let Some(seconds) = time_limit {
        spawn_watchdog(interrupt.clone(), seconds);
    }

    let outcome = EnsembleGenerator::new(settings.ensemble_config(&seed_type), &constraints)
        .with_interrupt(&interrupt)
        .generate(&seed)
        .context(MmdSnafu)?;
    if outcome.interrupted {
        warn!(
            "generation interrupted: saving {} of {} maps",
            outcome.ensemble.len(),
            settings.n_maps
        );
    }
    if !outcome.failed_maps.is_empty() {
        warn!("maps skipped after failures: {:?}", outcome.failed_maps);
    }

    let path = output_dir(&config, &root, out).join(outcome.ensemble.file_name());
    outcome.ensemble.to_file(&path).context(MmdSnafu)?;
    info!("wrote {} maps to {}", outcome.ensemble.len(), path.display());
    Ok(())
}

fn ensemble_seed_type(config: &RunConfig) -> String {
    match (&config.ensemble, &config.seed) {
        (Some(e), _) if e.seed_type.is_some() => e.seed_type.clone().unwrap_or_default(),
        (_, Some(s)) => s.seed_type().to_string(),
        _ => "seed".to_string(),
    }
}

/// The ensemble written by `run_ensemble` for these settings.
///
/// An interrupted run or a run that skipped failed maps saves fewer maps than
/// configured, under a name with the actual count: the largest one present
/// is used.
fn find_ensemble_file(
    dir: &Path,
    config: &RunConfig,
    settings: &EnsembleSettings,
) -> SimResult<PathBuf> {
    let seed_type = ensemble_seed_type(config);
    for n_maps in (0..=settings.n_maps).rev() {
        let name = ensemble_name(
            &seed_type,
            n_maps,
            &settings.constraints,
            settings.n_steps,
            settings.epsilon,
        );
        let path = dir.join(format!("{}.json", name));
        if path.is_file() {
            if n_maps < settings.n_maps {
                warn!(
                    "using a partial ensemble of {} of {} maps: {}",
                    n_maps,
                    settings.n_maps,
                    path.display()
                );
            }
            return Ok(path);
        }
    }
    whatever!(
        "no ensemble found in {} for {} maps of {} steps",
        dir.display(),
        settings.n_maps,
        settings.n_steps
    )
}

/// Runs one statewide election per map of an ensemble.
pub fn run_elections(
    config_path: &str,
    ensemble_path: Option<String>,
    out: Option<String>,
) -> SimResult<()> {
    let (config, root) = read_run_config(config_path)?;
    let settings = config
        .elections
        .as_ref()
        .context(MissingSectionSnafu { section: "elections" })?;
    let model = settings.voting_model()?;
    let tabulator = settings.tabulator()?;
    let graph = Arc::new(load_graph(&config, &root)?.graph);

    let ensemble_path = match (ensemble_path, &config.ensemble) {
        (Some(x), _) => PathBuf::from(x),
        (None, Some(e)) => find_ensemble_file(&output_dir(&config, &root, None), &config, e)?,
        (None, None) => whatever!("no ensemble file given and no 'ensemble' section"),
    };
    let ensemble = Ensemble::from_file(graph, &ensemble_path).context(MmdSnafu)?;

    let results = run_ensemble_elections(
        &ensemble,
        model.as_ref(),
        tabulator.as_ref(),
        settings.random_seed.unwrap_or(0),
    )
    .context(MmdSnafu)?;
    for (dem_seats, maps) in results.seat_distribution() {
        info!("{} Democratic seats: {} maps", dem_seats, maps);
    }

    let path = output_dir(&config, &root, out).join(results.file_name());
    results.to_file(&path).context(MmdSnafu)
}

fn result_stats_to_json(rs: &ElectionResult) -> Vec<JSValue> {
    let transfers_js = |ts: &TransferStats| {
        let mut transfers: JSMap<String, JSValue> = JSMap::new();
        for (name, count) in ts.transfers.iter() {
            transfers.insert(name.clone(), json!(count.to_string()));
        }
        if ts.exhausted > 0.0 {
            transfers.insert("exhausted".to_string(), json!(ts.exhausted.to_string()));
        }
        transfers
    };

    let mut l: Vec<JSValue> = Vec::new();
    for round_stat in rs.round_stats.iter() {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (name, count) in round_stat.tally.iter() {
            tally.insert(name.clone(), json!(count.to_string()));
        }

        let mut tally_results: Vec<JSValue> = Vec::new();
        for elected in round_stat.tally_results_elected.iter() {
            tally_results.push(json!({
                "elected": elected.name,
                "transfers": transfers_js(elected)
            }));
        }
        for elim_stats in round_stat.tally_results_eliminated.iter() {
            tally_results.push(json!({
                "eliminated": elim_stats.name,
                "transfers": transfers_js(elim_stats)
            }));
        }

        let js = json!({"round": round_stat.round, "tally": tally, "tallyResults": tally_results});
        l.push(js);
    }
    l
}

fn build_summary_js(seats: usize, rv: &ElectionResult) -> JSValue {
    let winners: Vec<&str> = rv.winners.iter().map(|c| c.name.as_str()).collect();
    json!({
        "config": {"seats": seats, "threshold": rv.threshold.to_string()},
        "winners": winners,
        "results": result_stats_to_json(rv) })
}

/// Tabulates the ballots file with the single transferable vote and checks
/// the summary against the reference, if any.
pub fn run_tabulate(
    input_path: &str,
    check_summary_path: Option<String>,
    out: Option<String>,
) -> SimResult<()> {
    let input: BallotFile = read_json(input_path)?;
    let rules = validate_rules(input.tiebreak_mode.as_deref(), input.random_seed)?;
    let candidates: Vec<(String, Party)> = input
        .candidates
        .iter()
        .map(|c| (c.name.clone(), c.party))
        .collect();

    let mut builder = Builder::new(&rules)
        .context(MmdSnafu)?
        .candidates(&candidates)
        .context(MmdSnafu)?;
    for b in input.ballots.iter() {
        builder
            .add_ballot(&b.choices, b.count.unwrap_or(1))
            .context(MmdSnafu)?;
    }
    let result = builder.run(input.seats).context(MmdSnafu)?;

    // Assemble the final json
    let result_js = build_summary_js(input.seats, &result);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {
        path: input_path,
    })?;
    match out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(p) => fs::write(p, &pretty_js_stats).context(WritingOutputSnafu { path: p })?,
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(&summary_p)?;
        let pretty_js_summary_ref = serde_json::to_string_pretty(&summary_ref)
            .context(ParsingJsonSnafu { path: summary_p })?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            return ReferenceMismatchSnafu {}.fail();
        }
    }

    Ok(())
}
