//! Command line interface definition.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// mitosis: annotation-driven replication of config maps and secrets
/// across the namespaces of a cluster.
#[derive(Debug, Parser)]
#[command(name = "mitosis")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Prefix prepended to every recognized annotation suffix.
    #[arg(long, default_value = mitosis_core::DEFAULT_ANNOTATIONS_PREFIX)]
    pub annotations_prefix: String,

    /// Path to a TOML credentials file; omitted means in-cluster.
    #[arg(long)]
    pub kube_config: Option<PathBuf>,

    /// Interval between informer resynchronizations.
    #[arg(long, default_value = "30m", value_parser = humantime::parse_duration)]
    pub resync_period: Duration,

    /// Replicators to run: a comma list of configmap,secret, or "all".
    #[arg(long, default_value = "all")]
    pub run_replicators: String,

    /// Labels applied to controller-created objects, as label=value pairs.
    #[arg(long, default_value = "")]
    pub create_with_labels: String,

    /// Allow replication of every object by default (CAUTION: only use
    /// when you know what you're doing).
    #[arg(long)]
    pub allow_all: bool,

    /// Tolerate unknown annotations under the controller prefix instead of
    /// skipping the carrying object.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub ignore_unknown: bool,

    /// Listen address for the status and liveness server.
    #[arg(long, default_value = "0.0.0.0:9102")]
    pub status_address: SocketAddr,

    /// Log output format.
    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// Structured JSON output.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["mitosis"]);
        assert_eq!(cli.annotations_prefix, mitosis_core::DEFAULT_ANNOTATIONS_PREFIX);
        assert_eq!(cli.resync_period, Duration::from_secs(30 * 60));
        assert_eq!(cli.run_replicators, "all");
        assert!(cli.ignore_unknown);
        assert!(!cli.allow_all);
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "mitosis",
            "--annotations-prefix",
            "example.com",
            "--resync-period",
            "90s",
            "--run-replicators",
            "secret",
            "--ignore-unknown",
            "false",
            "--allow-all",
            "--status-address",
            "127.0.0.1:9999",
        ]);
        assert_eq!(cli.annotations_prefix, "example.com");
        assert_eq!(cli.resync_period, Duration::from_secs(90));
        assert_eq!(cli.run_replicators, "secret");
        assert!(!cli.ignore_unknown);
        assert!(cli.allow_all);
        assert_eq!(cli.status_address.port(), 9999);
    }
}
