//! Teramem CLI - Inspect memory layouts and persistent regions.
//!
//! Resolves a memory configuration the same way the runtime does, and
//! exercises a file-backed persistent region outside of an engine.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use teramem_common::config::{MemoryConfig, SharingPolicyKind};

/// Teramem memory inspection tool.
#[derive(Parser)]
#[command(name = "teramem")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Suppress progress and info messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Output format options.
#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Sharing policy options.
#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Fixed execution/storage split
    Static,
    /// Execution and storage borrow from each other
    Unified,
}

impl From<PolicyArg> for SharingPolicyKind {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Static => SharingPolicyKind::StaticPartition,
            PolicyArg::Unified => SharingPolicyKind::Unified,
        }
    }
}

/// Memory configuration, from a JSON file and/or flags. Flags win.
#[derive(Args)]
struct ConfigArgs {
    /// JSON memory configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// On-heap execution pool size in bytes
    #[arg(long)]
    on_heap_execution: Option<u64>,

    /// On-heap storage pool size in bytes
    #[arg(long)]
    on_heap_storage: Option<u64>,

    /// Enable off-heap memory with this many bytes
    #[arg(long)]
    off_heap: Option<u64>,

    /// Enable persistent memory with this many bytes
    #[arg(long)]
    persistent: Option<u64>,

    /// Backing file of the persistent space
    #[arg(long)]
    persistent_path: Option<PathBuf>,

    /// Fraction of off-heap and persistent memory given to storage
    #[arg(long)]
    storage_fraction: Option<f64>,

    /// Cores used to derive the page size
    #[arg(long)]
    cores: Option<usize>,

    /// Sharing policy
    #[arg(long)]
    policy: Option<PolicyArg>,
}

impl ConfigArgs {
    /// Builds the effective configuration.
    fn load(&self) -> anyhow::Result<MemoryConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str(&text)?
            }
            None => MemoryConfig::default(),
        };

        if let Some(bytes) = self.on_heap_execution {
            config.on_heap_execution = bytes;
        }
        if let Some(bytes) = self.on_heap_storage {
            config.on_heap_storage = bytes;
        }
        if let Some(bytes) = self.off_heap {
            config = config.with_off_heap(bytes);
        }
        if let Some(bytes) = self.persistent {
            config.persistent.enabled = true;
            config.persistent.size = bytes;
        }
        if let Some(path) = &self.persistent_path {
            config.persistent.path = Some(path.clone());
        }
        if let Some(fraction) = self.storage_fraction {
            config = config.with_storage_fraction(fraction);
        }
        if let Some(cores) = self.cores {
            config = config.with_cores(cores);
        }
        if let Some(policy) = self.policy {
            config = config.with_sharing_policy(policy.into());
        }
        Ok(config)
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Show the resolved memory mode, pool capacities, and page size
    Info(ConfigArgs),

    /// Promote synthetic objects into a file-backed persistent region
    Region {
        /// Backing file of the persistent space
        #[arg(long)]
        path: PathBuf,

        /// Size of the persistent space in bytes
        #[arg(long)]
        size: u64,

        /// Size of each region in bytes (defaults to the whole space)
        #[arg(long)]
        region_size: Option<u64>,

        /// Payload size of each object in bytes
        #[arg(long, default_value_t = 64)]
        object: usize,

        /// Number of objects to promote
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays parseable
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else if !cli.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Info(args) => args
            .load()
            .and_then(|config| commands::info::run(&config, cli.format, cli.quiet)),
        Commands::Region {
            path,
            size,
            region_size,
            object,
            count,
        } => commands::region::run(
            &commands::region::RegionArgs {
                path,
                size,
                region_size,
                object,
                count,
            },
            cli.format,
            cli.quiet,
        ),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(
            &path,
            r#"{"off_heap": {"enabled": true, "size": 4096}, "storage_fraction": 0.25}"#,
        )
        .unwrap();

        let cli = parse(&[
            "teramem",
            "info",
            "--config",
            path.to_str().unwrap(),
            "--storage-fraction",
            "0.75",
            "--policy",
            "static",
        ]);
        let Commands::Info(args) = cli.command else {
            panic!("expected info");
        };
        let config = args.load().unwrap();
        assert!(config.off_heap.enabled);
        assert_eq!(config.off_heap.size, 4096);
        assert!((config.storage_fraction - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.sharing_policy, SharingPolicyKind::StaticPartition);
    }

    #[test]
    fn test_info_runs_on_defaults() {
        let cli = parse(&["teramem", "--format", "json", "-q", "info", "--cores", "4"]);
        let Commands::Info(args) = cli.command else {
            panic!("expected info");
        };
        let config = args.load().unwrap();
        assert!(commands::info::run(&config, cli.format, cli.quiet).is_ok());
    }
}
