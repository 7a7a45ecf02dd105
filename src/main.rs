use std::{fs::File, io::BufWriter, path::Path, process, time::Instant};

use clap::{App, Arg, ArgMatches};
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use petgraph::graph::NodeIndex;

use group_closeness::{centrality::default_n_threads, Error, GroupCloseness, Model, Result};

/// one row of the group CSV output
#[derive(Serialize)]
struct GroupMemberRecord<'a> {
    round: usize,
    node: usize,
    label: &'a str,
}

/// summary written as `group.json`
#[derive(Serialize)]
struct RunSummary<'a> {
    group_size: usize,
    max_depth: u64,
    n_threads: usize,
    group: Vec<&'a str>,
    farness: u64,
    score: f64,
    rounds: usize,
    evaluations: usize,
    pruned_rounds: usize,
    runtime_ms: u128,
}

/// main entry point of the program, configurable by CLI parameters
///
/// start with `cargo run --release -- -i edges.csv -k 10`
///
/// use `--help` to see a list of params
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let default_threads = default_n_threads().to_string();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))

        .arg(Arg::with_name("input")
            .short("i")
            .long("input")
            .help("edge list CSV file with header 'source,target'")
            .value_name("FILE")
            .required_unless_one(&["random", "snapshot"])
            .conflicts_with_all(&["random", "snapshot"]))

        .arg(Arg::with_name("random")
            .short("r")
            .long("random")
            .help("generate a G(n, p) random graph instead of reading one, e.g. '1000,0.01,42'")
            .value_name("N,P,SEED")
            .conflicts_with("snapshot"))

        .arg(Arg::with_name("snapshot")
            .short("s")
            .long("snapshot")
            .help("folder path of a model snapshot from a previous run")
            .value_name("FOLDER"))

        .arg(Arg::with_name("save_snapshot")
            .long("save-snapshot")
            .help("If specified, saves a snapshot of the loaded model to this folder")
            .value_name("FOLDER"))

        .arg(Arg::with_name("group_size")
            .short("k")
            .long("group_size")
            .help("number of nodes in the group")
            .default_value("5")
            .value_name("INTEGER"))

        .arg(Arg::with_name("max_depth")
            .short("d")
            .long("max_depth")
            .help("maximum number of hops explored around a candidate (0 = unbounded)")
            .default_value("0")
            .value_name("INTEGER"))

        .arg(Arg::with_name("n_threads")
            .short("t")
            .long("n_threads")
            .help("Specifies the number of threads evaluating candidates in each round.")
            .default_value(&default_threads)
            .value_name("INTEGER"))

        .arg(Arg::with_name("group")
            .short("g")
            .long("group")
            .help("If specified, scores this group of node labels instead of searching for one, e.g. 'a,b,c'")
            .value_name("LABELS"))

        .arg(Arg::with_name("export_as_dot_filepath")
            .short("e")
            .long("export_as_dot_filepath")
            .help("If specified, exports the graph as GraphViz DOT-Code to filepath")
            .value_name("FILE"))

        .arg(Arg::with_name("output_folder_path")
            .short("o")
            .long("output")
            .help("folder path for group.csv and group.json (default='.' aka. current directory)")
            .value_name("FOLDER"))

        .get_matches();

    if let Err(error) = run(&matches) {
        eprintln!("{} {}", "error:".red().bold(), error);
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    // parse config values from cli args
    let group_size: usize = parse_arg(matches, "group_size")?;
    let max_depth: u64 = parse_arg(matches, "max_depth")?;
    let n_threads: usize = parse_arg(matches, "n_threads")?;
    let output_folder_path = matches.value_of("output_folder_path").unwrap_or(".");

    let model = load_model(matches)?;

    if let Some(snapshot_folder_path) = matches.value_of("save_snapshot") {
        println!("saving snapshot of model to '{}'", snapshot_folder_path);
        model.save_to_file(snapshot_folder_path)?;
    }

    if let Some(export_as_dot_filepath) = matches.value_of("export_as_dot_filepath") {
        // if set, export dot-code of graph to file
        println!("exporting dot-code of graph to '{}'", export_as_dot_filepath);
        model.save_dot_code_to(export_as_dot_filepath)?;
    }

    println!(
        "graph: {} node(s), {} edge(s)",
        model.graph.node_count(),
        model.graph.edge_count()
    );

    if let Some(group_labels) = matches.value_of("group") {
        // only score the given group, no search
        let group = resolve_group(&model, group_labels)?;
        let group_closeness = GroupCloseness::new(&model.graph, group.len(), max_depth);

        println!(
            "{}",
            format!(
                "group of {} node(s): farness={}, farness within max_depth={}, score={:.6}",
                group.len(),
                group_closeness.compute_farness(&group, 0),
                group_closeness.compute_farness(&group, max_depth),
                group_closeness.score_of_group(&group)
            )
            .green()
        );

        return Ok(());
    }

    if group_size > model.graph.node_count() {
        println!(
            "{}",
            format!(
                "group_size={} exceeds the number of nodes ({}), the search will run out of candidates",
                group_size,
                model.graph.node_count()
            )
            .yellow()
        );
    }

    let start = Instant::now();

    let mut group_closeness = GroupCloseness::new(&model.graph, group_size, max_depth).with_threads(n_threads);
    group_closeness.run()?;

    let runtime_ms = start.elapsed().as_millis();
    let group = group_closeness.group()?;
    let farness = group_closeness.compute_farness(group, 0);
    let score = group_closeness.score_of_group(group);

    println!(
        "{}",
        format!(
            "selected {} node(s) in {}ms: farness={}, score={:.6}",
            group.len(),
            runtime_ms,
            farness,
            score
        )
        .green()
    );
    println!(
        "rounds={}, evaluations={}, pruned_rounds={}",
        group_closeness.rounds(),
        group_closeness.evaluations(),
        group_closeness.pruned()
    );

    let csv_filepath = Path::new(output_folder_path).join("group.csv");
    let mut writer = csv::Writer::from_path(&csv_filepath)?;
    for (round, node) in group.iter().enumerate() {
        writer.serialize(GroupMemberRecord {
            round,
            node: node.index(),
            label: model.label(*node),
        })?;
    }
    writer.flush()?;

    let summary = RunSummary {
        group_size,
        max_depth,
        n_threads,
        group: group.iter().map(|node| model.label(*node)).collect(),
        farness,
        score,
        rounds: group_closeness.rounds(),
        evaluations: group_closeness.evaluations(),
        pruned_rounds: group_closeness.pruned(),
        runtime_ms,
    };
    let json_filepath = Path::new(output_folder_path).join("group.json");
    serde_json::to_writer_pretty(BufWriter::new(File::create(&json_filepath)?), &summary)?;

    println!(
        "saved results to {} and {}",
        csv_filepath.display(),
        json_filepath.display()
    );

    Ok(())
}

// EXPLANATION OF the input options:
// -i reads an edge list CSV and builds a new model
// -r generates a random model (useful for benchmarks)
// -s loads a snapshot from a previous run (faster than parsing the CSV again)
fn load_model(matches: &ArgMatches) -> Result<Model> {
    let start = Instant::now();

    let model = if let Some(input_filepath) = matches.value_of("input") {
        println!("creating new model from edge list '{}'", input_filepath);
        Model::from_edge_list_csv(input_filepath)?
    } else if let Some(random_params) = matches.value_of("random") {
        let (n_nodes, edge_probability, seed) = parse_random_params(random_params)?;
        println!(
            "generating random model with n={}, p={}, seed={}",
            n_nodes, edge_probability, seed
        );
        Model::random(n_nodes, edge_probability, seed)
    } else {
        let snapshot_folder_path = matches.value_of("snapshot").unwrap_or(".");
        println!("loading model from snapshot '{}'", snapshot_folder_path);
        Model::load_from_file(snapshot_folder_path)?
    };

    println!("done ({}ms)", start.elapsed().as_millis());

    Ok(model)
}

/// looks up every label of a comma separated list, in order and without duplicates
fn resolve_group(model: &Model, group_labels: &str) -> Result<Vec<NodeIndex>> {
    let mut group = Vec::new();

    for label in group_labels.split(',').map(str::trim).filter(|label| !label.is_empty()) {
        let node = model.node_index(label)?;
        if !group.contains(&node) {
            group.push(node);
        }
    }

    if group.is_empty() {
        return Err(invalid_argument("group", group_labels));
    }

    Ok(group)
}

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    let value = matches.value_of(name).unwrap_or_default();
    value.trim().parse().map_err(|_| invalid_argument(name, value))
}

fn parse_random_params(random_params: &str) -> Result<(usize, f64, u64)> {
    let values: Vec<&str> = random_params.split(',').map(str::trim).collect();
    if values.len() != 3 {
        return Err(invalid_argument("random", random_params));
    }

    let n_nodes = values[0].parse().map_err(|_| invalid_argument("random", random_params))?;
    let edge_probability: f64 = values[1].parse().map_err(|_| invalid_argument("random", random_params))?;
    let seed = values[2].parse().map_err(|_| invalid_argument("random", random_params))?;

    if !(0.0..=1.0).contains(&edge_probability) {
        return Err(invalid_argument("random", random_params));
    }

    Ok((n_nodes, edge_probability, seed))
}

fn invalid_argument(name: &str, value: &str) -> Error {
    Error::InvalidArgument {
        name: name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_random_graph_params() {
        assert_eq!(parse_random_params("100, 0.05, 7").unwrap(), (100, 0.05, 7));
    }

    #[test]
    fn rejects_invalid_random_graph_params() {
        assert!(matches!(parse_random_params("100,0.05"), Err(Error::InvalidArgument { .. })));
        assert!(matches!(parse_random_params("100,1.5,7"), Err(Error::InvalidArgument { .. })));
        assert!(matches!(parse_random_params("x,0.5,7"), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn resolves_group_labels() {
        let edges: Vec<(String, String)> = vec![
            (String::from("a"), String::from("b")),
            (String::from("b"), String::from("c")),
        ];
        let model = Model::with_edges(&edges);

        assert_eq!(
            resolve_group(&model, "c, a,c").unwrap(),
            vec![NodeIndex::new(2), NodeIndex::new(0)]
        );
        assert!(matches!(resolve_group(&model, "a,x"), Err(Error::UnknownNode(label)) if label == "x"));
        assert!(matches!(resolve_group(&model, " , "), Err(Error::InvalidArgument { .. })));
    }
}
