use std::path::PathBuf;

use k8s_openapi::api::apps::v1::Deployment;
use serde::Deserialize;
use tokio::process::Command;

use crate::subprocess::run_subprocess;
use crate::wait::Progress;

const KUBECTL: &str = "kubectl";

pub struct Kubectl {
    kubeconfig: PathBuf,
}

/// The output of `kubectl get deployments -o json`.
///
/// kubectl reports a generic `v1` `List` rather than an `apps/v1` `DeploymentList`, which
/// `k8s_openapi::List` refuses to deserialize.
#[derive(Debug, Deserialize)]
pub struct DeploymentList {
    pub items: Vec<Deployment>,
}

/// Whether the latest generation of a deployment has rolled out and is serving.
pub fn is_rollout_complete(deployment: &Deployment) -> bool {
    let Some(generation) = deployment.metadata.generation else {
        return false;
    };

    let Some(status) = &deployment.status else {
        return false;
    };

    let Some(observed_generation) = status.observed_generation else {
        return false;
    };

    let generation_matched_observed = generation == observed_generation;
    let no_unavailable_replicas = status.unavailable_replicas.unwrap_or(0) == 0;
    let available = status.conditions.iter().flatten().any(|condition| {
        condition.type_ == "Available" && condition.status == "True"
    });

    generation_matched_observed && no_unavailable_replicas && available
}

impl DeploymentList {
    /// Done once at least one deployment matched and all of them have rolled out.
    pub fn availability(&self) -> Progress {
        if self.items.is_empty() {
            return Progress::Pending("no deployments created yet".to_string());
        }

        let pending: Vec<&str> = self
            .items
            .iter()
            .filter(|deployment| !is_rollout_complete(deployment))
            .map(|deployment| deployment.metadata.name.as_deref().unwrap_or("<unnamed>"))
            .collect();

        if pending.is_empty() {
            Progress::Done
        } else {
            Progress::Pending(format!("{} not rolled out yet", pending.join(", ")))
        }
    }
}

impl Kubectl {
    pub fn new(kubeconfig: PathBuf) -> Self {
        Self { kubeconfig }
    }

    fn command(&self, context: &str, namespace: &str) -> Command {
        let mut command = Command::new(KUBECTL);
        command
            .env("KUBECONFIG", &self.kubeconfig)
            .args(["--context", context])
            .args(["--namespace", namespace]);
        command
    }

    pub async fn apply(&self, context: &str, namespace: &str, manifest: String) -> anyhow::Result<()> {
        let mut command = self.command(context, namespace);
        command.args(["apply", "-f", "-"]);

        run_subprocess("kubectl apply", command, Some(manifest), true).await?;

        Ok(())
    }

    pub async fn deployments(
        &self,
        context: &str,
        namespace: &str,
        selector: &str,
    ) -> anyhow::Result<DeploymentList> {
        let mut command = self.command(context, namespace);
        command.args(["get", "deployments", "--selector", selector, "--output", "json"]);

        let output = run_subprocess("kubectl get", command, None, false).await?;

        Ok(serde_json::from_str(&output)?)
    }
}
