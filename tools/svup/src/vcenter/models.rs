//! Request and response bodies of the vCenter REST API (`/api/...`). Responses only declare the
//! fields svup reads, vCenter returns many more.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct DatacenterSummary {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct BaseImageSummary {
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct ClusterSummary {
    pub cluster: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NetworkSummary {
    pub network: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct StoragePolicySummary {
    pub policy: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SupervisorConfigStatus {
    Configuring,
    Removing,
    Running,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct SupervisorInfo {
    pub name: String,
    pub config_status: SupervisorConfigStatus,
    #[serde(default)]
    pub kubernetes_status: Option<String>,
    #[serde(default)]
    pub messages: Vec<StatusMessage>,
}

#[derive(Debug, Deserialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub details: Option<LocalizableMessage>,
}

#[derive(Debug, Deserialize)]
pub struct LocalizableMessage {
    pub default_message: String,
}

#[derive(Debug, Deserialize)]
pub struct SupervisorSummaryItem {
    pub supervisor: String,
    pub info: SupervisorInfo,
}

#[derive(Debug, Deserialize)]
pub struct SupervisorSummaryList {
    pub items: Vec<SupervisorSummaryItem>,
}

/// `namespace-management/clusters/{cluster}`, which reports the API endpoint of the Supervisor
/// enabled on a cluster.
#[derive(Debug, Deserialize)]
pub struct NamespaceManagementClusterInfo {
    #[serde(default)]
    pub api_server_cluster_endpoint: Option<String>,
}

//
// Supervisor enablement
//

#[derive(Debug, Serialize)]
pub struct EnableOnComputeClusterSpec {
    pub name: String,
    pub control_plane: ControlPlaneSpec,
    pub workloads: WorkloadsSpec,
}

#[derive(Debug, Serialize)]
pub struct ControlPlaneSpec {
    pub network: ControlPlaneNetwork,
    pub size: String,
    pub count: u8,
    pub storage_policy: String,
}

#[derive(Debug, Serialize)]
pub struct ControlPlaneNetwork {
    /// Logical name of the network inside the Supervisor
    pub network: String,
    pub backing: NetworkBacking,
    pub services: NetworkServices,
    pub ip_management: IpManagement,
}

#[derive(Debug, Serialize)]
pub struct NetworkBacking {
    pub backing: &'static str,
    pub network: String,
}

#[derive(Debug, Serialize)]
pub struct NetworkServices {
    pub dns: DnsSpec,
    pub ntp: NtpSpec,
}

#[derive(Debug, Serialize)]
pub struct DnsSpec {
    pub servers: Vec<String>,
    pub search_domains: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NtpSpec {
    pub servers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct IpManagement {
    pub dhcp_enabled: bool,
    pub gateway_address: String,
    pub ip_assignments: Vec<IpAssignment>,
}

#[derive(Debug, Serialize)]
pub struct IpAssignment {
    pub assignee: &'static str,
    pub ranges: Vec<IpRangeSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpRangeSpec {
    pub address: String,
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct WorkloadsSpec {
    pub network: WorkloadNetwork,
    pub edge: EdgeSpec,
    pub storage: WorkloadStorage,
}

#[derive(Debug, Serialize)]
pub struct WorkloadNetwork {
    pub network: String,
    pub network_type: &'static str,
    pub vsphere: VsphereNetwork,
    pub services: NetworkServices,
    pub ip_management: IpManagement,
}

#[derive(Debug, Serialize)]
pub struct VsphereNetwork {
    pub dvpg: String,
}

#[derive(Debug, Serialize)]
pub struct EdgeSpec {
    pub id: String,
    pub provider: &'static str,
    pub load_balancer_address_ranges: Vec<IpRangeSpec>,
    pub foundation: FoundationLoadBalancer,
}

#[derive(Debug, Serialize)]
pub struct FoundationLoadBalancer {
    pub deployment_target: DeploymentTarget,
    pub size: String,
    pub interfaces: Vec<LoadBalancerInterface>,
}

#[derive(Debug, Serialize)]
pub struct DeploymentTarget {
    pub availability: &'static str,
    pub storage_policy: String,
}

#[derive(Debug, Serialize)]
pub struct LoadBalancerInterface {
    pub personas: Vec<&'static str>,
    pub network: LoadBalancerNetwork,
}

#[derive(Debug, Serialize)]
pub struct LoadBalancerNetwork {
    pub network_type: &'static str,
    pub dvpg_network: DvpgNetwork,
}

#[derive(Debug, Serialize)]
pub struct DvpgNetwork {
    pub name: String,
    pub network: String,
    pub ipam: &'static str,
    pub ip_config: LoadBalancerIpConfig,
}

#[derive(Debug, Serialize)]
pub struct LoadBalancerIpConfig {
    pub ip_ranges: Vec<IpRangeSpec>,
    pub gateway: String,
}

#[derive(Debug, Serialize)]
pub struct WorkloadStorage {
    pub ephemeral_storage_policy: String,
    pub image_storage_policy: String,
}

//
// Supervisor Services
//

#[derive(Debug, Serialize)]
pub struct SupervisorServiceCreateSpec {
    pub carvel_spec: CarvelCreateSpec,
}

#[derive(Debug, Serialize)]
pub struct SupervisorServiceVersionCreateSpec {
    pub carvel_spec: CarvelVersionSpec,
}

#[derive(Debug, Serialize)]
pub struct CarvelCreateSpec {
    pub version_spec: CarvelVersionSpec,
}

#[derive(Debug, Serialize)]
pub struct CarvelVersionSpec {
    /// Base64 encoded Carvel package YAML
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SupervisorServiceInstallSpec {
    pub supervisor_service: String,
    pub version: String,
    /// Base64 encoded YAML values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaml_service_config: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceConfigStatus {
    Configuring,
    Configured,
    Error,
    Removing,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct InstalledServiceInfo {
    pub config_status: ServiceConfigStatus,
    #[serde(default)]
    pub messages: Vec<StatusMessage>,
}

//
// vSphere Namespaces
//

#[derive(Debug, Serialize)]
pub struct NamespaceCreateSpec {
    pub namespace: String,
    pub supervisor: String,
    pub storage_specs: Vec<StorageSpec>,
}

#[derive(Debug, Serialize)]
pub struct StorageSpec {
    pub policy: String,
}

/// Joins the default messages of status messages for error reports.
pub fn describe_messages(messages: &[StatusMessage]) -> String {
    let described: Vec<&str> = messages
        .iter()
        .filter_map(|message| message.details.as_ref())
        .map(|details| details.default_message.as_str())
        .collect();

    if described.is_empty() {
        "no details reported".to_string()
    } else {
        described.join("; ")
    }
}
