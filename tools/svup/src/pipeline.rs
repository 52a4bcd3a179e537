//! Runs the stages of a bring up in order, stopping at the first failure.

use std::time::Instant;

use anyhow::Context;
use clap::ValueEnum;

use crate::backend::Backend;
use crate::config::{Config, NetworkRole};
use crate::stages;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    /// Cluster with the host added and DRS/HA configured
    Cluster,
    /// Distributed switch and the four Supervisor port groups
    Network,
    /// VMFS datastore and the tag based storage policy
    Storage,
    /// Supervisor and its Supervisor Services
    Supervisor,
    /// vSphere Namespace and Argo CD instance
    #[clap(name = "argocd", aliases = &["argo-cd"])]
    ArgoCd,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Cluster,
        Stage::Network,
        Stage::Storage,
        Stage::Supervisor,
        Stage::ArgoCd,
    ];

    async fn run(self, backend: &dyn Backend, config: &Config) -> anyhow::Result<()> {
        match self {
            Stage::Cluster => stages::cluster::run(backend, config).await,
            Stage::Network => stages::network::run(backend, config).await,
            Stage::Storage => stages::storage::run(backend, config).await,
            Stage::Supervisor => stages::supervisor::run(backend, config).await,
            Stage::ArgoCd => stages::argocd::run(backend, config).await,
        }
    }
}

/// Checks preconditions and runs every stage from `from` onwards.
///
/// Earlier stages are skipped, not verified, so resuming assumes they completed before.
pub async fn run(backend: &dyn Backend, config: &Config, from: Stage) -> anyhow::Result<()> {
    stages::preconditions::check(backend, config)
        .await
        .context("Precondition check failed")?;

    for stage in Stage::ALL {
        if stage < from {
            tracing::info!("Skipping {stage} stage");
            continue;
        }

        println!("==> {stage} stage");
        let started = Instant::now();

        stage
            .run(backend, config)
            .await
            .with_context(|| format!("{stage} stage failed"))?;

        tracing::info!(
            "{stage} stage completed in {}s",
            started.elapsed().as_secs()
        );
    }

    println!(
        "Supervisor {} is running with Argo CD in vSphere Namespace {}",
        config.supervisor.name, config.supervisor.argocd.namespace
    );

    Ok(())
}

/// A human readable summary of what a bring up would do, shown by `--validate-only`.
pub fn describe(config: &Config, from: Stage) -> Vec<String> {
    let infrastructure = &config.infrastructure;
    let supervisor = &config.supervisor;

    let mut lines = vec![format!(
        "vCenter {} datacenter {}",
        infrastructure.vcenter.server, infrastructure.datacenter
    )];

    for stage in Stage::ALL {
        let skipped = if stage < from { " (skipped)" } else { "" };
        lines.push(format!("{stage}{skipped}:"));

        match stage {
            Stage::Cluster => {
                lines.push(format!(
                    "  cluster {} with ESX image {}",
                    infrastructure.cluster.name, infrastructure.cluster.esx_image_version
                ));
                lines.push(format!("  host {}", infrastructure.host.hostname));
            }
            Stage::Network => {
                lines.push(format!(
                    "  distributed switch {} MTU {}",
                    infrastructure.network.switch_name, infrastructure.network.mtu
                ));
                for port_group in infrastructure.network.port_groups() {
                    lines.push(format!(
                        "  port group {} VLAN {}",
                        port_group.name, port_group.vlan_id
                    ));
                }
            }
            Stage::Storage => {
                lines.push(format!(
                    "  datastore {} on {}",
                    infrastructure.storage.datastore_name,
                    infrastructure.storage.disk_canonical_name
                ));
                lines.push(format!(
                    "  storage policy {}",
                    infrastructure.storage.policy_name
                ));
            }
            Stage::Supervisor => {
                lines.push(format!(
                    "  supervisor {} size {} on {}",
                    supervisor.name,
                    supervisor.control_plane.size,
                    config.port_group_name(NetworkRole::Management)
                ));
                for service in supervisor.services_in_install_order() {
                    lines.push(format!("  service {} {}", service.id, service.version));
                }
            }
            Stage::ArgoCd => {
                lines.push(format!(
                    "  argocd {} version {} in namespace {}",
                    supervisor.argocd.instance_name,
                    supervisor.argocd.version,
                    supervisor.argocd.namespace
                ));
            }
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::config::fixture_config;

    fn stage_of(operation: &str) -> Option<Stage> {
        match operation {
            "ensure_cluster" | "ensure_host_in_cluster" | "configure_cluster" => {
                Some(Stage::Cluster)
            }
            "ensure_switch" | "ensure_port_group" => Some(Stage::Network),
            "ensure_datastore" | "ensure_storage_policy" => Some(Stage::Storage),
            "enable_supervisor" | "wait_for_supervisor" | "service_registered"
            | "register_service" | "service_installed" | "install_service"
            | "wait_for_service" => Some(Stage::Supervisor),
            "ensure_namespace" | "login_to_supervisor" | "apply_manifest"
            | "wait_for_deployments" => Some(Stage::ArgoCd),
            _ => None,
        }
    }

    fn stages_run(backend: &FakeBackend) -> Vec<Stage> {
        let mut stages: Vec<Stage> = backend
            .operations()
            .iter()
            .filter_map(|operation| stage_of(operation))
            .collect();
        stages.dedup();
        stages
    }

    #[tokio::test]
    async fn runs_every_stage_in_order() {
        let backend = FakeBackend::new();

        run(&backend, &fixture_config(), Stage::Cluster)
            .await
            .unwrap();

        assert_eq!(&backend.operations()[..2], ["datacenter_exists", "base_image_available"]);
        assert_eq!(stages_run(&backend), Stage::ALL.to_vec());
    }

    #[tokio::test]
    async fn failure_stops_later_stages() {
        let backend = FakeBackend::new().failing_on("ensure_port_group");

        let error = run(&backend, &fixture_config(), Stage::Cluster)
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "network stage failed");
        assert_eq!(format!("{:#}", error), "network stage failed: ensure_port_group failed");
        assert_eq!(stages_run(&backend), vec![Stage::Cluster, Stage::Network]);
        // The first port group failed so no further port groups were attempted
        assert_eq!(
            backend
                .operations()
                .iter()
                .filter(|op| *op == "ensure_port_group")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn resuming_skips_earlier_stages_but_checks_preconditions() {
        let backend = FakeBackend::new();

        run(&backend, &fixture_config(), Stage::Supervisor)
            .await
            .unwrap();

        assert_eq!(&backend.operations()[..2], ["datacenter_exists", "base_image_available"]);
        assert_eq!(stages_run(&backend), vec![Stage::Supervisor, Stage::ArgoCd]);
    }

    #[tokio::test]
    async fn failed_precondition_runs_no_stage() {
        let backend = FakeBackend::new().missing("base_image_available");

        let error = run(&backend, &fixture_config(), Stage::Cluster)
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "Precondition check failed");
        assert!(stages_run(&backend).is_empty());
    }

    #[tokio::test]
    async fn rerun_against_existing_objects_creates_nothing() {
        let backend = FakeBackend::new()
            .with_supervisor()
            .existing("ensure_cluster")
            .existing("ensure_host_in_cluster")
            .existing("ensure_switch")
            .existing("ensure_port_group")
            .existing("ensure_datastore")
            .existing("ensure_storage_policy")
            .existing("register_service")
            .existing("install_service")
            .existing("ensure_namespace");

        run(&backend, &fixture_config(), Stage::Cluster)
            .await
            .unwrap();

        let operations = backend.operations();
        for creating in ["enable_supervisor", "register_service", "install_service"] {
            assert!(!operations.iter().any(|op| op == creating), "{creating} was called");
        }
    }

    #[test]
    fn stage_names() {
        let names: Vec<String> = Stage::ALL.iter().map(|stage| stage.to_string()).collect();

        assert_eq!(names, ["cluster", "network", "storage", "supervisor", "argocd"]);
        assert_eq!(Stage::from_str("argocd", false).unwrap(), Stage::ArgoCd);
    }

    #[test]
    fn describe_marks_skipped_stages() {
        let lines = describe(&fixture_config(), Stage::Storage);

        assert!(lines.contains(&"cluster (skipped):".to_string()));
        assert!(lines.contains(&"storage:".to_string()));
        assert!(lines.contains(&"  port group Supervisor-VDS-lb-vip VLAN 40".to_string()));
        assert!(lines.contains(&"  service velero.vsphere.vmware.com 1.6.1".to_string()));
    }
}
