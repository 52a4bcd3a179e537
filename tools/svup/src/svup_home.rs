use directories::UserDirs;
use std::{
    fs,
    path::{Path, PathBuf},
};

const PREFLIGHT_FILE: &str = "preflight-passed";

/// The `.svup` directory in the operator's home directory.
///
/// Holds the preflight check record and the kubeconfig files written when logging in to a
/// Supervisor. Nothing in it describes the deployment, vCenter is the only source of truth.
pub struct SvupHome {
    svup_dir: PathBuf,
}

impl SvupHome {
    /// Gets or creates `~/.svup`, locating the home directory with the `directories` crate.
    pub fn new() -> anyhow::Result<Self> {
        let Some(user_dir) = UserDirs::new() else {
            anyhow::bail!("User has no home directory, cannot continue!");
        };

        Self::in_dir(user_dir.home_dir())
    }

    fn in_dir(home_dir: &Path) -> anyhow::Result<Self> {
        let svup_dir = home_dir.join(".svup");

        if !svup_dir.exists() {
            tracing::info!("Creating svup home directory");
            fs::create_dir(&svup_dir)?;
        }

        Ok(Self { svup_dir })
    }

    /// Whether the preflight check already passed for exactly these requirements.
    pub fn preflight_passed(&self, fingerprint: &str) -> bool {
        fs::read_to_string(self.svup_dir.join(PREFLIGHT_FILE))
            .is_ok_and(|recorded| recorded.trim_end() == fingerprint)
    }

    /// Records a passed preflight check, replacing any earlier record.
    pub fn record_preflight_passed(&self, fingerprint: &str) -> anyhow::Result<()> {
        fs::write(self.svup_dir.join(PREFLIGHT_FILE), format!("{fingerprint}\n"))?;

        Ok(())
    }

    /// Kubeconfig the VCF CLI and kubectl use for a Supervisor, kept apart from the operator's
    /// own `~/.kube/config`.
    pub fn kubeconfig_for_supervisor(&self, supervisor_name: &str) -> PathBuf {
        self.svup_dir.join(format!("kubeconfig-{supervisor_name}"))
    }
}
