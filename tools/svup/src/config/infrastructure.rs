use std::collections::HashSet;

use common::secret::Secret;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::{require_non_empty, Problems};

lazy_static! {
    static ref UPLINK_REGEX: Regex = Regex::new(r"^vmnic[0-9]+$").unwrap();
}

/// Prefixes of the canonical names ESX gives to block devices.
const DISK_NAME_PREFIXES: [&str; 4] = ["naa.", "mpx.", "t10.", "eui."];

pub const REQUIRED_VLAN_COUNT: usize = 4;
const MAX_VLAN_ID: u16 = 4094;

const MIN_MTU: u16 = 1500;
const MAX_MTU: u16 = 9000;

/// Contents of `infrastructure.json`: everything needed to turn a bare ESX host into a
/// cluster with networking and storage ready for a Supervisor.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InfrastructureConfig {
    pub vcenter: VcenterConfig,
    /// Must already exist in vCenter
    pub datacenter: String,
    pub cluster: ClusterConfig,
    pub host: HostConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VcenterConfig {
    /// Hostname or IP address of the vCenter appliance, without scheme
    pub server: String,
    pub username: String,
    pub password: Secret<String>,
    /// Accept self-signed certificates
    #[serde(default)]
    pub insecure: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClusterConfig {
    pub name: String,
    /// vLCM base image version the cluster is managed with, must already be in the depot
    pub esx_image_version: String,
    #[serde(default = "default_true")]
    pub drs: bool,
    #[serde(default = "default_true")]
    pub ha: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HostConfig {
    pub hostname: String,
    #[serde(default = "default_host_username")]
    pub username: String,
    pub password: Secret<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NetworkConfig {
    pub switch_name: String,
    #[serde(default)]
    pub switch_version: Option<String>,
    #[serde(default = "default_mtu")]
    pub mtu: u16,
    pub uplinks: Vec<String>,
    /// Exactly four, in the order of [`NetworkRole::ALL`]
    pub vlan_ids: Vec<u16>,
    #[serde(default)]
    pub port_group_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StorageConfig {
    pub datastore_name: String,
    pub disk_canonical_name: String,
    pub policy_name: String,
    #[serde(default = "default_tag_category")]
    pub tag_category: String,
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_host_username() -> String {
    "root".to_string()
}

fn default_mtu() -> u16 {
    MIN_MTU
}

fn default_tag_category() -> String {
    "svup-storage".to_string()
}

/// The four networks of the Supervisor topology, each backed by its own port group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum NetworkRole {
    #[strum(serialize = "management")]
    Management,
    #[strum(serialize = "workload")]
    Workload,
    #[strum(serialize = "load balancer management")]
    LoadBalancerManagement,
    #[strum(serialize = "load balancer virtual IP")]
    LoadBalancerVip,
}

impl NetworkRole {
    pub const ALL: [NetworkRole; REQUIRED_VLAN_COUNT] = [
        NetworkRole::Management,
        NetworkRole::Workload,
        NetworkRole::LoadBalancerManagement,
        NetworkRole::LoadBalancerVip,
    ];

    fn port_group_suffix(&self) -> &'static str {
        match self {
            NetworkRole::Management => "management",
            NetworkRole::Workload => "workload",
            NetworkRole::LoadBalancerManagement => "lb-management",
            NetworkRole::LoadBalancerVip => "lb-vip",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortGroup {
    pub role: NetworkRole,
    pub name: String,
    /// `0` means untagged
    pub vlan_id: u16,
}

impl NetworkConfig {
    pub fn port_group_name(&self, role: NetworkRole) -> String {
        let prefix = self
            .port_group_prefix
            .as_deref()
            .unwrap_or(&self.switch_name);

        format!("{prefix}-{}", role.port_group_suffix())
    }

    /// The port groups to create on the switch, in creation order.
    pub fn port_groups(&self) -> Vec<PortGroup> {
        NetworkRole::ALL
            .iter()
            .zip(&self.vlan_ids)
            .map(|(role, vlan_id)| PortGroup {
                role: *role,
                name: self.port_group_name(*role),
                vlan_id: *vlan_id,
            })
            .collect()
    }

    fn validate(&self, problems: &mut Problems) {
        require_non_empty(problems, "network.switchName", &self.switch_name);

        if let Some(version) = &self.switch_version {
            require_non_empty(problems, "network.switchVersion", version);
        }

        if let Some(prefix) = &self.port_group_prefix {
            require_non_empty(problems, "network.portGroupPrefix", prefix);
        }

        if !(MIN_MTU..=MAX_MTU).contains(&self.mtu) {
            problems.push(format!(
                "network.mtu must be between {MIN_MTU} and {MAX_MTU}, got {}",
                self.mtu
            ));
        }

        if self.uplinks.is_empty() {
            problems.push("network.uplinks must name at least one physical NIC".to_string());
        }

        let mut seen_uplinks = HashSet::new();
        for uplink in &self.uplinks {
            if !UPLINK_REGEX.is_match(uplink) {
                problems.push(format!(
                    "network.uplinks entry '{uplink}' is not a physical NIC name such as 'vmnic1'"
                ));
            }
            if !seen_uplinks.insert(uplink) {
                problems.push(format!("network.uplinks lists '{uplink}' more than once"));
            }
        }

        if self.vlan_ids.len() != REQUIRED_VLAN_COUNT {
            problems.push(format!(
                "network.vlanIds must contain exactly {REQUIRED_VLAN_COUNT} VLAN IDs (management, workload, load balancer management, load balancer virtual IP), got {}",
                self.vlan_ids.len()
            ));
        }

        let mut seen_vlans = HashSet::new();
        for vlan_id in &self.vlan_ids {
            if *vlan_id > MAX_VLAN_ID {
                problems.push(format!(
                    "network.vlanIds entry {vlan_id} is outside of the range 0..={MAX_VLAN_ID}"
                ));
            }
            if !seen_vlans.insert(vlan_id) {
                problems.push(format!(
                    "network.vlanIds lists VLAN {vlan_id} more than once, each network needs its own VLAN"
                ));
            }
        }
    }
}

impl StorageConfig {
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.policy_name)
    }

    fn validate(&self, problems: &mut Problems) {
        require_non_empty(problems, "storage.datastoreName", &self.datastore_name);
        require_non_empty(problems, "storage.policyName", &self.policy_name);
        require_non_empty(problems, "storage.tagCategory", &self.tag_category);

        if let Some(tag) = &self.tag {
            require_non_empty(problems, "storage.tag", tag);
        }

        if !DISK_NAME_PREFIXES
            .iter()
            .any(|prefix| self.disk_canonical_name.starts_with(prefix))
        {
            problems.push(format!(
                "storage.diskCanonicalName '{}' is not a canonical disk name, expected one starting with {}",
                self.disk_canonical_name,
                DISK_NAME_PREFIXES.join(", ")
            ));
        }
    }
}

fn validate_hostname(problems: &mut Problems, field: &str, value: &str) {
    require_non_empty(problems, field, value);

    if value.contains("://") || value.contains('/') || value.chars().any(char::is_whitespace) {
        problems.push(format!(
            "{field} '{value}' must be a bare hostname or IP address without scheme or path"
        ));
    }
}

impl InfrastructureConfig {
    #[cfg(test)]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub(super) fn validate(&self, problems: &mut Problems) {
        validate_hostname(problems, "vcenter.server", &self.vcenter.server);
        require_non_empty(problems, "vcenter.username", &self.vcenter.username);
        require_non_empty(problems, "vcenter.password", &self.vcenter.password);

        require_non_empty(problems, "datacenter", &self.datacenter);

        require_non_empty(problems, "cluster.name", &self.cluster.name);
        require_non_empty(
            problems,
            "cluster.esxImageVersion",
            &self.cluster.esx_image_version,
        );

        validate_hostname(problems, "host.hostname", &self.host.hostname);
        require_non_empty(problems, "host.username", &self.host.username);
        require_non_empty(problems, "host.password", &self.host.password);

        self.network.validate(problems);
        self.storage.validate(problems);
    }
}
