//! Logs in to a Supervisor with the VCF CLI, which writes kubeconfig contexts for the Supervisor
//! and each vSphere Namespace the user can access.

use std::path::PathBuf;

use common::secret::Secret;
use tokio::process::Command;

use crate::subprocess::run_subprocess;

const VCF: &str = "vcf";
const PASSWORD_ENV: &str = "VCF_CLI_VSPHERE_PASSWORD";

pub struct Vcf {
    kubeconfig: PathBuf,
}

impl Vcf {
    /// Contexts are written to `kubeconfig` rather than the operator's own kubeconfig.
    pub fn new(kubeconfig: PathBuf) -> Self {
        Self { kubeconfig }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(VCF);
        command.env("KUBECONFIG", &self.kubeconfig);
        command
    }

    /// Replaces any earlier context of the same name, so a changed endpoint or expired token
    /// never lingers.
    pub async fn create_context(
        &self,
        context: &str,
        endpoint: &str,
        username: &str,
        password: &Secret<String>,
        insecure: bool,
    ) -> anyhow::Result<()> {
        let mut delete = self.command();
        delete.args(["context", "delete", context, "--yes"]);

        if run_subprocess("vcf context delete", delete, None, false)
            .await
            .is_ok()
        {
            tracing::debug!("Removed previous VCF CLI context {context}");
        }

        let mut create = self.command();
        create
            .args(["context", "create", context])
            .args(["--endpoint", endpoint])
            .args(["--username", username])
            .args(["--auth-type", "basic"])
            .env(PASSWORD_ENV, password.expose());

        if insecure {
            create.arg("--insecure-skip-tls-verify");
        }

        run_subprocess("vcf context create", create, None, true).await?;

        Ok(())
    }
}

/// The kubeconfig context the VCF CLI creates for a vSphere Namespace.
pub fn namespace_context(context: &str, namespace: &str) -> String {
    format!("{context}:{namespace}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_contexts_are_scoped_by_supervisor_context() {
        assert_eq!(namespace_context("supervisor", "argocd"), "supervisor:argocd");
    }
}
