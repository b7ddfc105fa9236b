// Reader for precinct graphs in the networkx adjacency format.

use crate::sim::config_reader::GraphSource;
use crate::sim::*;

use log::{debug, info};
use mmd_ensemble::*;
use serde_json::Value as JSValue;
use snafu::prelude::*;
use std::collections::HashMap;

/// The precinct graph and, if the source names a district column, the
/// single-member district of every precinct in graph order.
pub struct GraphData {
    pub graph: PrecinctGraph,
    pub districts: Option<Vec<DistrictId>>,
}

fn read_js_number(x: &JSValue) -> Option<f64> {
    match x {
        JSValue::Number(n) => n.as_f64(),
        JSValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn read_js_int(x: &JSValue) -> Option<u64> {
    match x {
        JSValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        JSValue::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn column<T>(
    node: &JSValue,
    idx: usize,
    name: &str,
    read: impl Fn(&JSValue) -> Option<T>,
) -> SimResult<T> {
    read(&node[name]).context(MissingColumnSnafu {
        node: idx,
        column: name,
    })
}

/// Counts are rounded: some census exports carry fractional populations.
fn count_column(node: &JSValue, idx: usize, name: &str) -> SimResult<u64> {
    let x = column(node, idx, name, read_js_number)?;
    ensure!(
        x >= 0.0,
        MissingColumnSnafu {
            node: idx,
            column: name
        }
    );
    Ok(x.round() as u64)
}

pub fn parse_graph(js: &JSValue, source: &GraphSource) -> SimResult<GraphData> {
    let nodes = match js["nodes"].as_array() {
        Some(x) => x,
        None => whatever!("the graph has no 'nodes' array"),
    };
    let adjacency = match js["adjacency"].as_array() {
        Some(x) if x.len() == nodes.len() => x,
        Some(x) => whatever!(
            "the graph has {} adjacency lists for {} nodes",
            x.len(),
            nodes.len()
        ),
        None => whatever!("the graph has no 'adjacency' array"),
    };

    // Adjacency entries refer to the node 'id', which may differ from the
    // precinct id column.
    let mut by_node_id: HashMap<String, PrecinctId> = HashMap::with_capacity(nodes.len());
    let mut precincts: Vec<Precinct> = Vec::with_capacity(nodes.len());
    let mut districts: Vec<DistrictId> = Vec::new();
    for (idx, node) in nodes.iter().enumerate() {
        let id_column = source.id_column.as_deref().unwrap_or("id");
        let id = column(node, idx, id_column, read_js_int)?;
        by_node_id.insert(node["id"].to_string(), id);
        precincts.push(Precinct {
            id,
            population: count_column(node, idx, &source.population_column)?,
            votes: VoteTally {
                dem: count_column(node, idx, &source.dem_column)?,
                rep: count_column(node, idx, &source.rep_column)?,
            },
        });
        if let Some(c) = source.district_column.as_deref() {
            districts.push(column(node, idx, c, read_js_int)? as DistrictId);
        }
    }

    let mut edges: Vec<(PrecinctId, PrecinctId)> = Vec::new();
    for (idx, neighbors) in adjacency.iter().enumerate() {
        let neighbors = match neighbors.as_array() {
            Some(x) => x,
            None => whatever!("the adjacency of node {} is not a list", idx),
        };
        for nb in neighbors.iter() {
            let key = nb["id"].to_string();
            match by_node_id.get(&key) {
                Some(&other) => edges.push((precincts[idx].id, other)),
                None => whatever!("node {} is adjacent to unknown node {}", idx, key),
            }
        }
    }
    debug!("parse_graph: {} nodes, {} adjacency entries", nodes.len(), edges.len());

    let graph = PrecinctGraph::new(precincts, &edges).context(MmdSnafu)?;
    Ok(GraphData {
        graph,
        districts: source.district_column.as_ref().map(|_| districts),
    })
}

pub fn read_graph(path: &str, source: &GraphSource) -> SimResult<GraphData> {
    info!("Attempting to read graph file {:?}", path);
    let js: JSValue = read_json(path)?;
    let data = parse_graph(&js, source)?;
    info!(
        "read {} precincts and {} edges",
        data.graph.len(),
        data.graph.edges().len()
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(district_column: Option<&str>) -> GraphSource {
        GraphSource {
            file_path: "unused.json".to_string(),
            id_column: Some("GEOID".to_string()),
            population_column: "TOTPOP".to_string(),
            dem_column: "D".to_string(),
            rep_column: "R".to_string(),
            district_column: district_column.map(|s| s.to_string()),
        }
    }

    #[test]
    fn reads_networkx_adjacency() {
        let js = json!({
            "nodes": [
                {"id": 0, "GEOID": "3701", "TOTPOP": 10.4, "D": 3, "R": "4", "CD": "2"},
                {"id": 1, "GEOID": 3702, "TOTPOP": 12, "D": 5, "R": 1, "CD": 1},
                {"id": 2, "GEOID": 3703, "TOTPOP": 7, "D": 0, "R": 7, "CD": 1}
            ],
            "adjacency": [
                [{"id": 1}],
                [{"id": 0}, {"id": 2}],
                [{"id": 1}]
            ]
        });
        let data = parse_graph(&js, &source(Some("CD"))).unwrap();
        assert_eq!(data.graph.len(), 3);
        assert_eq!(data.graph.edges().len(), 2);
        assert_eq!(data.graph.precinct(0).id, 3701);
        assert_eq!(data.graph.precinct(0).population, 10);
        assert_eq!(data.graph.precinct(0).votes.rep, 4);
        assert_eq!(data.districts, Some(vec![2, 1, 1]));
    }

    #[test]
    fn rejects_missing_columns_and_unknown_neighbors() {
        let js = json!({
            "nodes": [{"id": 0, "GEOID": 1, "TOTPOP": 1, "D": 1}],
            "adjacency": [[]]
        });
        assert!(matches!(
            parse_graph(&js, &source(None)),
            Err(SimError::MissingColumn { .. })
        ));

        let js = json!({
            "nodes": [{"id": 0, "GEOID": 1, "TOTPOP": 1, "D": 1, "R": 0}],
            "adjacency": [[{"id": 9}]]
        });
        assert!(parse_graph(&js, &source(None)).is_err());
    }
}
