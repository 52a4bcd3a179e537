use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::Stage;

/// Brings up a single-node vSphere Supervisor with Argo CD on a bare ESX host managed by vCenter.
///
/// Every stage is idempotent, so a failed bring up can be re-run, optionally starting from the
/// stage that failed with `--from`.
#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// vCenter, cluster, host, network and storage configuration
    #[clap(value_name = "INFRASTRUCTURE_JSON")]
    pub infrastructure_json: PathBuf,
    /// Supervisor, Supervisor Services and Argo CD configuration
    #[clap(value_name = "SUPERVISOR_JSON")]
    pub supervisor_json: PathBuf,
    /// Validate the configuration files and print the plan without touching vCenter
    #[clap(long)]
    pub validate_only: bool,
    /// Skip the stages before this one, assuming they completed in an earlier run
    #[clap(long, value_enum, default_value_t = Stage::Cluster)]
    pub from: Stage,
    #[clap(long)]
    pub skip_preflight_checks: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_from_stage() {
        let cli = Cli::parse_from(["svup", "--from", "argocd", "infra.json", "supervisor.json"]);

        assert_eq!(cli.from, Stage::ArgoCd);
        assert_eq!(cli.infrastructure_json, PathBuf::from("infra.json"));
        assert!(!cli.validate_only);
    }

    #[test]
    fn defaults_to_first_stage() {
        let cli = Cli::parse_from(["svup", "infra.json", "supervisor.json"]);

        assert_eq!(cli.from, Stage::Cluster);
    }

    #[test]
    fn rejects_unknown_stage() {
        let result = Cli::try_parse_from(["svup", "--from", "vsan", "a.json", "b.json"]);

        assert!(result.is_err());
    }
}
