use anyhow::Context;

use super::report;
use crate::backend::Backend;
use crate::config::{ArgoCdConfig, Config};
use crate::error::ProvisionError;

const INSTANCE_TEMPLATE: &str = include_str!("argocd-instance.yaml");

/// Every Argo CD component deployment carries this label.
pub const COMPONENT_SELECTOR: &str = "app.kubernetes.io/part-of=argocd";

/// Fills in the `{{name}}`, `{{namespace}}` and `{{version}}` placeholders of an instance
/// manifest.
pub fn render_manifest(template: &str, argocd: &ArgoCdConfig) -> String {
    template
        .replace("{{name}}", &argocd.instance_name)
        .replace("{{namespace}}", &argocd.namespace)
        .replace("{{version}}", &argocd.version)
}

async fn instance_manifest(argocd: &ArgoCdConfig) -> anyhow::Result<String> {
    let template = match &argocd.manifest {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {path:?}"))?,
        None => INSTANCE_TEMPLATE.to_string(),
    };

    Ok(render_manifest(&template, argocd))
}

/// Creates the vSphere Namespace and an Argo CD instance in it through the Argo CD Operator.
pub async fn run(backend: &dyn Backend, config: &Config) -> anyhow::Result<()> {
    let supervisor = &config.supervisor;
    let argocd = &supervisor.argocd;

    let Some(supervisor_id) = backend.find_supervisor(&supervisor.name).await? else {
        return Err(ProvisionError::not_found("Supervisor", &supervisor.name).into());
    };

    let outcome = backend
        .ensure_namespace(&supervisor_id, &argocd.namespace, &supervisor.storage_policy)
        .await?;
    report(format_args!("vSphere Namespace {}", argocd.namespace), outcome);

    let context = backend
        .login_to_supervisor(
            &config.infrastructure.cluster.name,
            &supervisor.name,
            &argocd.namespace,
        )
        .await?;

    let manifest = instance_manifest(argocd).await?;
    backend
        .apply_manifest(&context, &argocd.namespace, &manifest)
        .await?;
    println!(
        "Applied Argo CD instance {} version {}",
        argocd.instance_name, argocd.version
    );

    backend
        .wait_for_deployments(
            &context,
            &argocd.namespace,
            COMPONENT_SELECTOR,
            supervisor.timeouts.argocd(),
        )
        .await?;
    println!(
        "Argo CD {} is available in vSphere Namespace {}",
        argocd.instance_name, argocd.namespace
    );

    Ok(())
}
