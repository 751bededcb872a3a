use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylevec_core::SourceId;
use stylevec_features::{compare, describe_traits, CaptureDocument, Shape, DEFAULT_INSIGHTS, GLOBAL_STYLE};
use stylevec_storage::{IngestPipeline, PipelineConfig, StyleStore};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Style fingerprints and similarity search for captured web sources
#[derive(Parser, Debug)]
#[command(name = "stylevec")]
#[command(about = "Style fingerprints and similarity search", long_about = None)]
struct Args {
    /// Path to the data directory
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Pipeline configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest capture documents (one object or an array per file)
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Nearest sources to a stored source
    Query {
        source_id: String,
        #[arg(long, default_value = GLOBAL_STYLE)]
        shape: String,
        #[arg(short, default_value_t = 10)]
        k: usize,
    },
    /// Explain the differences between two stored sources
    Compare {
        left: String,
        right: String,
        #[arg(long, default_value = GLOBAL_STYLE)]
        shape: String,
        /// Number of insights to report
        #[arg(long, default_value_t = DEFAULT_INSIGHTS)]
        top: usize,
    },
    /// List built-in shapes and how many sources each index holds
    Shapes,
    /// Manage snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Write a full dump and truncate the WAL
    Save,
}

#[derive(Subcommand, Debug)]
enum SnapshotAction {
    Create,
    List,
    Restore { name: String },
    Delete { name: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShapeSummary {
    key: String,
    dimension: usize,
    requires_cta: bool,
    stored: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonOutput {
    #[serde(flatten)]
    comparison: stylevec_features::StyleComparison,
    left_traits: Vec<String>,
    right_traits: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so command output on stdout stays parseable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    info!("StyleVec v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);

    let store = Arc::new(
        StyleStore::open(&args.data_dir, config.distance)
            .with_context(|| format!("opening store at {}", args.data_dir.display()))?,
    );
    info!("Store opened with {} sources", store.len());

    match args.command {
        Command::Ingest { files } => {
            let mut docs = Vec::new();
            for file in &files {
                docs.extend(read_documents(file)?);
            }
            let pipeline = IngestPipeline::new(
                store.clone(),
                config.build_extractor()?,
                config.build_resolver()?,
                config.pool_size,
            );
            let report = pipeline.ingest_batch(docs).await;
            print_json(&report)?;
            if !report.failed.is_empty() {
                info!("{} of {} sources failed", report.failed.len(), report.total());
            }
        }
        Command::Query { source_id, shape, k } => {
            let hits = store.query_similar(&SourceId::new(source_id), &shape, k)?;
            print_json(&hits)?;
        }
        Command::Compare {
            left,
            right,
            shape,
            top,
        } => {
            let lookup = |id: &str| {
                store
                    .get(&SourceId::new(id))
                    .ok_or_else(|| anyhow!("source '{}' is not stored", id))
            };
            let (left, right) = (lookup(&left)?, lookup(&right)?);
            let vector = |record: &stylevec_storage::SourceRecord| {
                record
                    .vector_named(&shape)
                    .cloned()
                    .ok_or_else(|| anyhow!("source '{}' has no '{}' vector", record.source_id, shape))
            };
            let (a, b) = (vector(&left)?, vector(&right)?);
            print_json(&ComparisonOutput {
                comparison: compare(&a, &b, top)?,
                left_traits: describe_traits(&a),
                right_traits: describe_traits(&b),
            })?;
        }
        Command::Shapes => {
            let stored = store.shapes();
            let normalization = stylevec_features::NORMALIZATION_VERSION;
            let summaries: Vec<ShapeSummary> = Shape::builtin()
                .iter()
                .map(|shape| {
                    let key = shape.key(normalization);
                    ShapeSummary {
                        stored: stored.iter().find(|(k, _)| *k == key).map_or(0, |(_, n)| *n),
                        key: key.to_string(),
                        dimension: shape.dimension,
                        requires_cta: shape.requires_cta,
                    }
                })
                .collect();
            print_json(&summaries)?;
        }
        Command::Snapshot { action } => match action {
            SnapshotAction::Create => print_json(&store.create_snapshot()?)?,
            SnapshotAction::List => print_json(&store.list_snapshots()?)?,
            SnapshotAction::Restore { name } => {
                let restored = store.restore_snapshot(&name)?;
                info!("Restored {} sources from {}", restored, name);
            }
            SnapshotAction::Delete { name } => {
                if !store.delete_snapshot(&name)? {
                    return Err(anyhow!("snapshot '{}' not found", name));
                }
            }
        },
        Command::Save => {
            store.save()?;
            info!("Saved {} sources", store.len());
        }
    }

    Ok(())
}

fn read_documents(path: &Path) -> anyhow::Result<Vec<CaptureDocument>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let docs = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value),
        other => serde_json::from_value(other).map(|doc| vec![doc]),
    };
    docs.with_context(|| format!("{} is not a capture document", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_defaults_to_library_insight_count() {
        let args = Args::try_parse_from(["stylevec", "compare", "a.com", "b.com"]).unwrap();
        match args.command {
            Command::Compare { top, shape, .. } => {
                assert_eq!(top, DEFAULT_INSIGHTS);
                assert_eq!(shape, GLOBAL_STYLE);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_top_override() {
        let args = Args::try_parse_from(["stylevec", "compare", "a.com", "b.com", "--top", "2"]).unwrap();
        assert!(matches!(args.command, Command::Compare { top: 2, .. }));
    }
}
