//! CLI tooling.
//!
//! Command-line interface for maintaining the usage store: full
//! reconciliation against a content snapshot, usage listings and manual
//! record removal. Operations are idempotent; rerunning a command converges
//! on the same store state.

use crate::classify::PropertyClassifier;
use crate::config::IndexConfig;
use crate::error::IndexError;
use crate::format::{
    format_reconcile_report_json, format_reconcile_report_text, format_usages_json,
    format_usages_text,
};
use crate::key::decode_usage_key;
use crate::logging::{init_logging, LoggingConfig};
use crate::query::UsageQuery;
use crate::reconcile::{ReconcileProgress, ReconcileReport, Reconciler};
use crate::snapshot::ContentSnapshot;
use crate::store::persistence::SledUsageStore;
use crate::store::UsageStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Asset usage index maintenance
#[derive(Parser)]
#[command(name = "asset-usage")]
#[command(about = "Maintain and inspect the asset usage index")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Usage store directory (overrides config)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List recorded usages
    FindAll {
        /// Only list usages of this asset
        #[arg(long)]
        asset: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Reconcile the store against a content snapshot
    Update {
        /// Content snapshot file (JSON)
        snapshot: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Remove a single usage record
    Unregister {
        /// Usage key (hex)
        usage_key: String,
        /// Asset identifier
        asset_id: String,
    },
}

/// Reports scan progress through the log, one line per batch of nodes.
struct LogProgress;

const PROGRESS_BATCH: usize = 500;

impl ReconcileProgress for LogProgress {
    fn begin(&self, nodes_total: usize) {
        info!(nodes = nodes_total, "scanning content nodes");
    }

    fn node_scanned(&self, nodes_processed: usize, nodes_total: usize) {
        if nodes_processed % PROGRESS_BATCH == 0 {
            info!(
                processed = nodes_processed,
                total = nodes_total,
                "scan progress"
            );
        }
    }

    fn finish(&self, _report: &ReconcileReport) {}
}

/// CLI context holding the opened usage store.
pub struct CliContext {
    store: Arc<SledUsageStore>,
}

impl CliContext {
    /// Load configuration, initialize logging and open the store.
    pub fn new(cli: &Cli) -> Result<Self, IndexError> {
        let config = if let Some(path) = &cli.config {
            IndexConfig::load_from_file(path)?
        } else {
            IndexConfig::load_default()?
        };

        let logging = apply_log_overrides(config.logging.clone(), cli);
        init_logging(Some(&logging))?;

        let store_path = match &cli.store {
            Some(path) => path.clone(),
            None => config.resolve_store_path()?,
        };
        let store = SledUsageStore::open(&store_path)?;
        Ok(Self {
            store: Arc::new(store),
        })
    }

    /// Execute a command and return its rendered output.
    pub fn execute(&self, command: &Commands) -> Result<String, IndexError> {
        match command {
            Commands::FindAll { asset, format } => self.find_all(asset.as_deref(), format),
            Commands::Update { snapshot, format } => self.update(snapshot, format),
            Commands::Unregister {
                usage_key,
                asset_id,
            } => self.unregister(usage_key, asset_id),
        }
    }

    fn find_all(&self, asset: Option<&str>, format: &str) -> Result<String, IndexError> {
        let store = Arc::clone(&self.store) as Arc<dyn UsageStore>;
        let records = match asset {
            Some(asset_id) => UsageQuery::new(store).usage_references(asset_id)?,
            None => store.list_all()?,
        };
        match format {
            "json" => Ok(format_usages_json(&records)),
            _ => Ok(format_usages_text(&records)),
        }
    }

    fn update(&self, snapshot_path: &PathBuf, format: &str) -> Result<String, IndexError> {
        let snapshot = Arc::new(ContentSnapshot::from_file(snapshot_path)?);
        let reconciler = Reconciler::new(
            Arc::clone(&self.store) as Arc<dyn UsageStore>,
            Arc::clone(&snapshot) as _,
            Arc::clone(&snapshot) as _,
            Arc::new(PropertyClassifier::new()),
        );
        let report = reconciler.run_with_progress(snapshot.as_ref(), &LogProgress)?;
        self.store.flush()?;
        match format {
            "json" => Ok(format_reconcile_report_json(&report)),
            _ => Ok(format_reconcile_report_text(&report)),
        }
    }

    fn unregister(&self, usage_key: &str, asset_id: &str) -> Result<String, IndexError> {
        let key = decode_usage_key(usage_key)
            .ok_or_else(|| IndexError::Config(format!("invalid usage key: {}", usage_key)))?;
        let removed = self.store.unregister(key, asset_id)?;
        self.store.flush()?;
        if removed {
            Ok(format!(
                "Unregistered usage of '{}' under key {}.",
                asset_id, usage_key
            ))
        } else {
            Ok(format!(
                "No usage of '{}' recorded under key {}; nothing to do.",
                asset_id, usage_key
            ))
        }
    }
}

fn apply_log_overrides(mut logging: LoggingConfig, cli: &Cli) -> LoggingConfig {
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        logging.file = Some(file.clone());
    }
    logging
}
