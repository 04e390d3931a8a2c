//! Mentorgraph CLI: edit the directory and recompute positions from the shell

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use mentorgraph::graph::{Person, PersonId, Relationship, RelationshipKind};
use mentorgraph::jobs::{RecalcWorker, Recalculator, TriggerOutcome};
use mentorgraph::layout::{compute_layout, LayoutReport};
use mentorgraph::persistence::{
    legacy_mapping, migrate_position_ids, DataSource, Directory, FilePositionStore, PositionStore,
};
use mentorgraph::EngineConfig;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn, Level};

#[derive(Parser)]
#[command(name = "mentorgraph-cli", version, about = "Mentorship graph layout engine")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "MENTORGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// People and relationships data file
    #[arg(long, global = true, env = "MENTORGRAPH_DATA")]
    data: Option<PathBuf>,

    /// Position file
    #[arg(long, global = true, env = "MENTORGRAPH_POSITIONS")]
    positions: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute and save all positions
    Recalculate,
    /// Show the layer of every person
    Layers,
    /// Print the graph export
    Export,
    /// Show saved positions
    Positions,
    /// Add a person
    AddPerson {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// Derived from the name when omitted
        #[arg(long)]
        id: Option<String>,
        /// Explicit generation
        #[arg(long)]
        level: Option<i64>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Remove a person and their relationships
    RemovePerson { id: String },
    /// Add a mentor -> mentee relationship
    Link {
        source: String,
        target: String,
        #[arg(long, default_value = "mentorship")]
        kind: RelationshipKind,
    },
    /// Remove relationships from source to target
    Unlink {
        source: String,
        target: String,
        /// Only this kind; all kinds when omitted
        #[arg(long)]
        kind: Option<RelationshipKind>,
    },
    /// Fold a duplicate person into another
    Merge { source: String, target: String },
    /// Rewrite legacy `last_first` position keys to current ids
    MigrateIds {
        /// Report without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Recalculate whenever the data file changes
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    debug!("Using data {:?}, positions {:?}", config.data_path, config.positions_path);

    match cli.command {
        Commands::Recalculate => {
            let report = Recalculator::from_config(&config).recalculate_positions().await?;
            print_report(&report, &cli.format)?;
        }
        Commands::Layers => run_layers(&config, &cli.format)?,
        Commands::Export => {
            let directory = open_directory(&config)?;
            println!("{}", directory.export().to_json_pretty()?);
        }
        Commands::Positions => run_positions(&config, &cli.format)?,
        Commands::AddPerson { first_name, last_name, id, level, bio } => {
            let mut directory = open_directory(&config)?;
            let mut person = Person::new(id.unwrap_or_default(), first_name, last_name);
            person.level = level;
            person.bio = bio;
            let change = directory.create_person(person)?;
            directory.save()?;
            println!("Created {}", change.value);
            recalculate_after_change(&config).await?;
        }
        Commands::RemovePerson { id } => {
            let mut directory = open_directory(&config)?;
            let change = directory.delete_person(&PersonId::from(id.as_str()))?;
            directory.save()?;
            println!("Removed {} and {} relationship(s)", id, change.value.len());
            recalculate_after_change(&config).await?;
        }
        Commands::Link { source, target, kind } => {
            let mut directory = open_directory(&config)?;
            directory.create_relationship(Relationship::new(source.as_str(), target.as_str(), kind))?;
            directory.save()?;
            println!("Linked {} -> {} ({})", source, target, kind);
            recalculate_after_change(&config).await?;
        }
        Commands::Unlink { source, target, kind } => {
            let mut directory = open_directory(&config)?;
            let change = directory.delete_relationship(
                &PersonId::from(source.as_str()),
                &PersonId::from(target.as_str()),
                kind,
            )?;
            directory.save()?;
            println!("Removed {} relationship(s)", change.value);
            recalculate_after_change(&config).await?;
        }
        Commands::Merge { source, target } => {
            let mut directory = open_directory(&config)?;
            let change = directory
                .merge_people(&PersonId::from(source.as_str()), &PersonId::from(target.as_str()))?;
            directory.save()?;
            println!(
                "Merged {} into {}: {} re-pointed, {} dropped",
                source, target, change.value.repointed, change.value.dropped
            );
            recalculate_after_change(&config).await?;
        }
        Commands::MigrateIds { dry_run } => run_migrate(&config, dry_run)?,
        Commands::Watch { interval_ms } => run_watch(&config, Duration::from_millis(interval_ms)).await?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(data) = &cli.data {
        config.data_path = data.clone();
    }
    if let Some(positions) = &cli.positions {
        config.positions_path = positions.clone();
    }
    Ok(config)
}

fn open_directory(config: &EngineConfig) -> anyhow::Result<Directory> {
    Directory::open(&config.data_path, config.policy.clone())
        .with_context(|| format!("opening {}", config.data_path.display()))
}

/// Structural edits go through the worker like any other trigger, then the
/// CLI waits for it to drain before exiting
async fn recalculate_after_change(config: &EngineConfig) -> anyhow::Result<()> {
    let worker = RecalcWorker::spawn(Recalculator::from_config(config));
    worker.trigger();
    let status = worker.shutdown().await;
    match status.last_error {
        Some(e) => warn!("Positions not updated: {}", e),
        None => info!("Positions updated"),
    }
    Ok(())
}

fn print_report(report: &LayoutReport, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Metric", "Value"]);
            table.add_row(vec!["People".to_string(), report.people.to_string()]);
            table.add_row(vec!["Relationships".to_string(), report.relationships.to_string()]);
            table.add_row(vec!["Components".to_string(), report.components.to_string()]);
            table.add_row(vec!["Broken cycles".to_string(), report.broken_cycles.to_string()]);
            table.add_row(vec!["Layering passes".to_string(), report.passes.to_string()]);
            table.add_row(vec!["Iterations".to_string(), report.iterations.to_string()]);
            table.add_row(vec!["Converged".to_string(), report.converged.to_string()]);
            table.add_row(vec!["Displacement".to_string(), format!("{:.3}", report.displacement)]);
            table.add_row(vec!["Reused".to_string(), report.reused.to_string()]);
            table.add_row(vec!["Placed".to_string(), report.placed.to_string()]);
            println!("{}", table);
        }
    }
    Ok(())
}

fn run_layers(config: &EngineConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let directory = open_directory(config)?;
    let previous = FilePositionStore::new(&config.positions_path)
        .load_or_cold()
        .with_context(|| format!("reading {}", config.positions_path.display()))?;
    let layout = compute_layout(directory.graph(), &previous, &config.solver);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&layout.layers)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Id", "Name", "Layer", "Pinned"]);
            for (id, layer) in &layout.layers {
                let person = directory.get_person(&PersonId::from(id.as_str()));
                table.add_row(vec![
                    id.clone(),
                    person.map(|p| p.display_name()).unwrap_or_default(),
                    layer.to_string(),
                    person.map_or(false, |p| p.level.is_some()).to_string(),
                ]);
            }
            println!("{}", table);
            println!("{} people", layout.layers.len());
        }
    }
    Ok(())
}

fn run_positions(config: &EngineConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let positions = FilePositionStore::new(&config.positions_path).load()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&positions)?),
        OutputFormat::Table => {
            if positions.is_empty() {
                println!("(no positions)");
                return Ok(());
            }
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Id", "X", "Y"]);
            for (id, p) in &positions {
                table.add_row(vec![id.clone(), format!("{:.2}", p.x), format!("{:.2}", p.y)]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn run_migrate(config: &EngineConfig, dry_run: bool) -> anyhow::Result<()> {
    let directory = open_directory(config)?;
    let store = FilePositionStore::new(&config.positions_path);
    let people = directory.people()?;
    let migration = migrate_position_ids(&store.load()?, &legacy_mapping(&people));

    println!(
        "Converted {}, unmapped {}",
        migration.positions.len(),
        migration.unmapped.len()
    );
    for old in &migration.unmapped {
        println!("  no mapping for {}", old);
    }
    if !dry_run {
        store.save(&migration.positions)?;
    }
    Ok(())
}

fn modified_at(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

async fn run_watch(config: &EngineConfig, interval: Duration) -> anyhow::Result<()> {
    if interval.is_zero() {
        bail!("interval must be positive");
    }
    let worker = RecalcWorker::spawn(Recalculator::from_config(config));
    let mut last_seen = modified_at(&config.data_path);
    worker.trigger();
    println!("Watching {} (Ctrl-C to stop)", config.data_path.display());

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let current = modified_at(&config.data_path);
                if current != last_seen {
                    last_seen = current;
                    if worker.trigger() == TriggerOutcome::Stopped {
                        break;
                    }
                    info!("Data file changed, recalculation requested");
                }
            }
        }
    }

    let status = worker.shutdown().await;
    println!(
        "Stopped: {} completed, {} failed, {} coalesced",
        status.completed, status.failed, status.coalesced
    );
    Ok(())
}
