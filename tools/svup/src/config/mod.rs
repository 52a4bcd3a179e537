//! Loading and validation of the two configuration files driving a bring up.
//!
//! Validation collects every problem it finds rather than stopping at the first, so an operator
//! can fix a configuration file in one go.

mod infrastructure;
mod ipv4;
mod supervisor;

use std::{
    fs,
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use infrastructure::{
    ClusterConfig, HostConfig, InfrastructureConfig, NetworkConfig, NetworkRole, PortGroup,
    StorageConfig, VcenterConfig,
};
pub use ipv4::Ipv4Cidr;
pub use supervisor::{ArgoCdConfig, NetworkSpec, ServiceSpec, SupervisorConfig};

lazy_static! {
    static ref DNS_LABEL_REGEX: Regex = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap();
}

const MAX_DNS_LABEL_LENGTH: usize = 63;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration:\n{}", bullet_list(.0))]
    Invalid(Vec<String>),
}

fn bullet_list(problems: &[String]) -> String {
    problems
        .iter()
        .map(|problem| format!("  - {problem}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Accumulates validation failures across both configuration files.
#[derive(Debug, Default)]
pub struct Problems(Vec<String>);

impl Problems {
    pub fn push(&mut self, problem: String) {
        self.0.push(problem);
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

fn require_non_empty(problems: &mut Problems, field: &str, value: &str) {
    if value.trim().is_empty() {
        problems.push(format!("{field} must not be empty"));
    }
}

fn require_dns_label(problems: &mut Problems, field: &str, value: &str) {
    if value.len() > MAX_DNS_LABEL_LENGTH || !DNS_LABEL_REGEX.is_match(value) {
        problems.push(format!(
            "{field} '{value}' must be a DNS label: at most {MAX_DNS_LABEL_LENGTH} lowercase letters, digits and '-', starting and ending with a letter or digit"
        ));
    }
}

#[derive(Debug)]
pub struct Config {
    pub infrastructure: InfrastructureConfig,
    pub supervisor: SupervisorConfig,
}

impl Config {
    /// Validates each file on its own and then the values shared between them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Problems::default();

        self.infrastructure.validate(&mut problems);
        self.supervisor.validate(&mut problems);

        if self.supervisor.storage_policy != self.infrastructure.storage.policy_name {
            problems.push(format!(
                "storagePolicy '{}' in the supervisor configuration must be the policy created by the infrastructure configuration, '{}'",
                self.supervisor.storage_policy, self.infrastructure.storage.policy_name
            ));
        }

        let problems = problems.into_vec();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// The port group a Supervisor network is attached to.
    pub fn port_group_name(&self, role: NetworkRole) -> String {
        self.infrastructure.network.port_group_name(role)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads, parses and validates `infrastructure.json` and `supervisor.json`.
pub fn load(infrastructure_path: &Path, supervisor_path: &Path) -> Result<Config, ConfigError> {
    tracing::debug!("Loading infrastructure configuration from {infrastructure_path:?}");
    let infrastructure: InfrastructureConfig = read_json(infrastructure_path)?;

    tracing::debug!("Loading supervisor configuration from {supervisor_path:?}");
    let mut supervisor: SupervisorConfig = read_json(supervisor_path)?;

    let base_dir = supervisor_path.parent().unwrap_or(Path::new(""));
    supervisor.resolve_paths(base_dir);

    let config = Config {
        infrastructure,
        supervisor,
    };

    config.validate()?;

    Ok(config)
}

/// The configuration under `fixtures/`, for tests elsewhere in the crate.
#[cfg(test)]
pub fn fixture_config() -> Config {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures");

    load(&dir.join("infrastructure.json"), &dir.join("supervisor.json"))
        .expect("fixtures are valid")
}
