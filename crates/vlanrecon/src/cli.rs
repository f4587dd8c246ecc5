//! Command line surface of the `vlanrecon` binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use vlanrecon_common::{CommandRunner, ExecMode, ReconcileError, ReconcileResult};

use crate::config::{BridgeTuning, PlatformKind, ReconcileConfig};
use crate::linux::LinuxPlatform;
use crate::opx::OpxPlatform;
use crate::reconcile::{Reconciler, RunMode, RunSummary};
use crate::schema::Schema;

/// Reconcile switch VLANs, bridges, routes and isolation ACLs with a schema
#[derive(Parser, Debug)]
#[command(name = "vlanrecon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Platform adapter driving the switch
    #[arg(long, value_enum, default_value_t = PlatformKind::Linux, global = true)]
    pub platform: PlatformKind,

    /// Log state-changing commands instead of running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info", global = true)]
    pub log_level: String,

    /// Leave multicast snooping enabled on VLAN bridges
    #[arg(long, global = true)]
    pub keep_multicast_snooping: bool,

    /// Do not enable proxy ARP on VLAN bridges
    #[arg(long, global = true)]
    pub no_proxy_arp: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tear down managed state and rebuild it from a schema
    Apply(ApplyArgs),
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Network schema file (YAML or JSON)
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Only tear down; no schema is needed
    #[arg(short = 'd', long)]
    pub down: bool,
}

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Down,
    Apply { file: PathBuf },
}

impl Cli {
    /// Builds the run configuration from the flags.
    pub fn config(&self) -> ReconcileConfig {
        let exec_mode = if self.dry_run {
            ExecMode::DryRun
        } else {
            ExecMode::Live
        };
        ReconcileConfig::default()
            .with_platform(self.platform)
            .with_exec_mode(exec_mode)
            .with_bridge_tuning(BridgeTuning {
                disable_multicast_snooping: !self.keep_multicast_snooping,
                enable_proxy_arp: !self.no_proxy_arp,
            })
    }

    /// Checks argument combinations clap cannot express.
    pub fn invocation(&self) -> ReconcileResult<Invocation> {
        let Command::Apply(args) = &self.command;
        match (&args.file, args.down) {
            (_, true) => Ok(Invocation::Down),
            (Some(file), false) => Ok(Invocation::Apply { file: file.clone() }),
            (None, false) => Err(ReconcileError::usage(
                "--file is required unless --down is given",
            )),
        }
    }
}

/// Loads the schema, if any, and runs it against the configured platform.
///
/// The schema is read before teardown starts, so an unreadable file leaves
/// the box untouched.
pub async fn execute(config: ReconcileConfig, invocation: &Invocation) -> ReconcileResult<RunSummary> {
    let schema = match invocation {
        Invocation::Down => None,
        Invocation::Apply { file } => Some(Schema::load(file).await?),
    };
    let mode = match &schema {
        Some(schema) => RunMode::Apply(schema),
        None => RunMode::DownOnly,
    };

    let runner = CommandRunner::new(config.exec_mode);
    match config.platform {
        PlatformKind::Linux => {
            Reconciler::new(LinuxPlatform::new(runner), config)
                .run(mode)
                .await
        }
        PlatformKind::Opx => Reconciler::new(OpxPlatform::new(runner), config).run(mode).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_down_needs_no_file() {
        let cli = parse(&["vlanrecon", "apply", "--down"]);
        assert_eq!(cli.invocation().unwrap(), Invocation::Down);
    }

    #[test]
    fn test_apply_with_file() {
        let cli = parse(&["vlanrecon", "apply", "-f", "net.yaml"]);
        assert_eq!(
            cli.invocation().unwrap(),
            Invocation::Apply {
                file: PathBuf::from("net.yaml")
            }
        );
    }

    #[test]
    fn test_missing_file_is_usage_error() {
        let cli = parse(&["vlanrecon", "apply"]);
        let err = cli.invocation().unwrap_err();
        assert!(matches!(err, ReconcileError::Usage { .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["vlanrecon"]).is_err());
    }

    #[test]
    fn test_config_from_flags() {
        let cli = parse(&[
            "vlanrecon",
            "apply",
            "--down",
            "--platform",
            "opx",
            "--dry-run",
            "--no-proxy-arp",
        ]);
        let config = cli.config();
        assert_eq!(config.platform, PlatformKind::Opx);
        assert_eq!(config.exec_mode, ExecMode::DryRun);
        assert!(config.bridge.disable_multicast_snooping);
        assert!(!config.bridge.enable_proxy_arp);
    }

    #[test]
    fn test_default_config_from_flags() {
        let cli = parse(&["vlanrecon", "apply", "-f", "net.yaml"]);
        assert_eq!(cli.config(), ReconcileConfig::default());
    }

    #[tokio::test]
    async fn test_unreadable_schema_fails_before_teardown() {
        let config = ReconcileConfig::default().with_exec_mode(ExecMode::DryRun);
        let invocation = Invocation::Apply {
            file: PathBuf::from("/nonexistent/net.yaml"),
        };
        let err = execute(config, &invocation).await.unwrap_err();
        assert!(matches!(err, ReconcileError::SchemaLoad { .. }));
    }
}
