use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use stepflow_graph::{EditorConfig, LayoutMode, NodeKind};
use stepflow_model::{collect_uuids, parse_integration, render, Integration, SourceFormat};
use stepflow_store::{DocumentStore, IntegrationStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn file_arg() -> Arg {
    Arg::new("file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Integration document (YAML or JSON)")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn cli() -> Command {
    Command::new("stepflow")
        .version(stepflow_graph::VERSION)
        .about("Inspect step-forest integration documents")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Editor configuration (TOML)"),
        )
        .subcommand(
            Command::new("graph")
                .about("Derive the node/edge graph")
                .arg(file_arg())
                .arg(
                    Arg::new("layout")
                        .long("layout")
                        .value_parser(value_parser!(LayoutMode))
                        .help("horizontal or vertical"),
                )
                .arg(
                    Arg::new("multiple-flows")
                        .long("multiple-flows")
                        .action(ArgAction::SetTrue)
                        .help("Wrap the flow in a group node"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("nested")
                .about("List steps living inside branches")
                .arg(file_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("uuids")
                .about("Print regenerated step identifiers")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("normalize")
                .about("Re-emit the document with regenerated identifiers")
                .arg(file_arg())
                .arg(json_arg()),
        )
}

fn load_config(matches: &ArgMatches) -> Result<EditorConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EditorConfig::default()),
    }
}

fn load_document(path: &Path) -> Result<(Integration, SourceFormat)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SourceFormat::from_extension)
        .unwrap_or_else(|| SourceFormat::detect(&text));
    let integration =
        parse_integration(&text).with_context(|| format!("parsing {}", path.display()))?;
    debug!(path = %path.display(), %format, "document loaded");
    Ok((integration, format))
}

/// Load a document into a store so identifiers are regenerated
fn open_store(config: &EditorConfig, args: &ArgMatches) -> Result<(DocumentStore, SourceFormat)> {
    let path = args
        .get_one::<PathBuf>("file")
        .context("missing document path")?;
    let (integration, format) = load_document(path)?;
    Ok((
        DocumentStore::with_document(config.store.clone(), integration),
        format,
    ))
}

fn graph(config: &EditorConfig, args: &ArgMatches) -> Result<()> {
    let (store, _) = open_store(config, args)?;
    let mut settings = config.graph;
    if let Some(layout) = args.get_one::<LayoutMode>("layout") {
        settings.layout = *layout;
    }
    if args.get_flag("multiple-flows") {
        settings.multiple_flows = true;
    }
    let graph = settings.service().derive(&store.integration());
    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        layout = %settings.layout,
        "graph derived"
    );

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    }
    println!("Nodes:");
    for node in &graph.nodes {
        let marker = match node.kind {
            NodeKind::Step => "step",
            NodeKind::Placeholder => "slot",
            NodeKind::Group => "group",
        };
        println!(
            "  [{marker:>5}] {:<48} rank {:>2} lane {:>2}  {}",
            node.id, node.position.rank, node.position.lane, node.label
        );
    }
    println!("Edges:");
    for edge in &graph.edges {
        let label = edge.label.as_deref().unwrap_or("");
        println!("  {} -> {} ({:?}) {label}", edge.source, edge.target, edge.kind);
    }
    Ok(())
}

fn nested(config: &EditorConfig, args: &ArgMatches) -> Result<()> {
    let (store, _) = open_store(config, args)?;
    let nested = store.nested_steps();
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(nested.as_ref())?);
        return Ok(());
    }
    println!("Nested steps: {}", nested.len());
    for entry in nested.iter() {
        println!(
            "  {:<40} {:<16} at {} (origin {} #{})",
            entry.step.uuid, entry.step.name, entry.path, entry.origin_step_uuid, entry.origin_index
        );
    }
    Ok(())
}

fn uuids(config: &EditorConfig, args: &ArgMatches) -> Result<()> {
    let (store, _) = open_store(config, args)?;
    for uuid in collect_uuids(&store.steps()) {
        println!("{uuid}");
    }
    Ok(())
}

fn normalize(config: &EditorConfig, args: &ArgMatches) -> Result<()> {
    let (store, format) = open_store(config, args)?;
    let format = if args.get_flag("json") {
        SourceFormat::Json
    } else {
        format
    };
    print!("{}", render(&store.integration(), format)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let Some((name, args)) = matches.subcommand() else {
        return Ok(());
    };
    let config = load_config(args)?;

    match name {
        "graph" => graph(&config, args),
        "nested" => nested(&config, args),
        "uuids" => uuids(&config, args),
        "normalize" => normalize(&config, args),
        _ => Ok(()),
    }
}
