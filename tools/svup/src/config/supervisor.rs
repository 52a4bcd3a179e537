use std::{
    collections::HashSet,
    net::Ipv4Addr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use super::{
    ipv4::{last_address, range_contains, Ipv4Cidr},
    require_dns_label, require_non_empty, Problems,
};

/// One control plane node needs a node address, the floating API address and a spare address
/// used while upgrading.
pub const MIN_MANAGEMENT_ADDRESSES: u16 = 5;
pub const SINGLE_NODE_CONTROL_PLANE_COUNT: u8 = 1;
/// A day, longer than any bring up step takes
pub const MAX_TIMEOUT_MINUTES: u64 = 24 * 60;

/// Contents of `supervisor.json`: the sizing, availability and networking of the Supervisor
/// and the services and Argo CD instance installed on it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SupervisorConfig {
    pub name: String,
    pub control_plane: ControlPlaneConfig,
    pub storage_policy: String,
    pub management_network: NetworkSpec,
    pub workload_network: NetworkSpec,
    pub load_balancer: LoadBalancerConfig,
    pub dns_servers: Vec<Ipv4Addr>,
    pub ntp_servers: Vec<String>,
    #[serde(default)]
    pub search_domains: Vec<String>,
    pub service_cidr: Ipv4Cidr,
    pub services: Vec<ServiceSpec>,
    pub argocd: ArgoCdConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ControlPlaneConfig {
    pub size: ControlPlaneSize,
    #[serde(default = "default_control_plane_count")]
    pub count: u8,
}

fn default_control_plane_count() -> u8 {
    SINGLE_NODE_CONTROL_PLANE_COUNT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlPlaneSize {
    Tiny,
    Small,
    Medium,
    Large,
}

/// A statically addressed network: the subnet is derived from the starting address and prefix.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NetworkSpec {
    pub starting_address: Ipv4Addr,
    pub address_count: u16,
    pub prefix_length: u8,
    pub gateway: Ipv4Addr,
}

impl NetworkSpec {
    pub fn subnet(&self) -> Option<Ipv4Cidr> {
        Ipv4Cidr::new(self.starting_address, self.prefix_length).ok()
    }

    /// The gateway in the `address/prefix` form vCenter expects.
    pub fn gateway_cidr(&self) -> String {
        format!("{}/{}", self.gateway, self.prefix_length)
    }

    fn validate(&self, problems: &mut Problems, field: &str, min_addresses: u16) {
        if !(1..=30).contains(&self.prefix_length) {
            problems.push(format!(
                "{field}.prefixLength must be between 1 and 30, got {}",
                self.prefix_length
            ));
            return;
        }

        let Some(subnet) = self.subnet() else {
            return;
        };

        if self.address_count < min_addresses {
            problems.push(format!(
                "{field}.addressCount must be at least {min_addresses}, got {}",
                self.address_count
            ));
        }

        if !subnet.contains_host(self.gateway) {
            problems.push(format!(
                "{field}.gateway {} is not a host address of {}",
                self.gateway,
                subnet.to_network_string()
            ));
        }

        if !subnet.contains_host(self.starting_address) {
            problems.push(format!(
                "{field}.startingAddress {} is not a host address of {}",
                self.starting_address,
                subnet.to_network_string()
            ));
            return;
        }

        let Some(last) = last_address(self.starting_address, self.address_count) else {
            return;
        };

        if !subnet.contains_host(last) {
            problems.push(format!(
                "{field} range {}-{last} does not fit in {}",
                self.starting_address,
                subnet.to_network_string()
            ));
        }

        if range_contains(self.starting_address, last, self.gateway) {
            problems.push(format!(
                "{field}.gateway {} lies inside the address range {}-{last}",
                self.gateway, self.starting_address
            ));
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IpRange {
    pub starting_address: Ipv4Addr,
    pub address_count: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoadBalancerConfig {
    pub management_network: NetworkSpec,
    /// Addresses of the load balancer's frontend interface, the subnet also hosts the virtual IPs
    pub virtual_ip_network: NetworkSpec,
    /// Virtual server addresses handed out to Kubernetes services of type LoadBalancer
    pub virtual_ip_range: IpRange,
    #[serde(default)]
    pub size: LoadBalancerSize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancerSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl LoadBalancerConfig {
    fn validate(&self, problems: &mut Problems) {
        // Each load balancer interface needs an address per node plus one spare
        self.management_network
            .validate(problems, "loadBalancer.managementNetwork", 2);
        self.virtual_ip_network
            .validate(problems, "loadBalancer.virtualIpNetwork", 2);

        let vip = &self.virtual_ip_range;

        let Some(network) = self.virtual_ip_network.subnet() else {
            return;
        };

        let Some(last) = last_address(vip.starting_address, vip.address_count) else {
            problems.push("loadBalancer.virtualIpRange.addressCount must be at least 1".into());
            return;
        };

        if !network.contains_host(vip.starting_address) || !network.contains_host(last) {
            problems.push(format!(
                "loadBalancer.virtualIpRange {}-{last} does not fit in {}",
                vip.starting_address,
                network.to_network_string()
            ));
            return;
        }

        if range_contains(vip.starting_address, last, self.virtual_ip_network.gateway) {
            problems.push(format!(
                "loadBalancer.virtualIpRange {}-{last} contains the gateway {}",
                vip.starting_address, self.virtual_ip_network.gateway
            ));
        }

        let interfaces = &self.virtual_ip_network;
        if let Some(interfaces_last) =
            last_address(interfaces.starting_address, interfaces.address_count)
        {
            let overlaps = range_contains(vip.starting_address, last, interfaces.starting_address)
                || range_contains(interfaces.starting_address, interfaces_last, vip.starting_address);

            if overlaps {
                problems.push(format!(
                    "loadBalancer.virtualIpRange {}-{last} overlaps the interface addresses {}-{interfaces_last}",
                    vip.starting_address, interfaces.starting_address
                ));
            }
        }
    }
}

/// The services every Supervisor built by this tool needs. The actual Supervisor Service IDs
/// vary between releases so they are configured, and the role says what a service is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceRole {
    #[strum(serialize = "VM Operator")]
    VmOperator,
    #[strum(serialize = "vSphere Kubernetes Service")]
    Vks,
    #[strum(serialize = "Velero")]
    Velero,
    #[serde(rename = "argocd-operator")]
    #[strum(serialize = "Argo CD Operator")]
    ArgoCdOperator,
}

impl ServiceRole {
    pub const REQUIRED: [ServiceRole; 4] = [
        ServiceRole::VmOperator,
        ServiceRole::Vks,
        ServiceRole::Velero,
        ServiceRole::ArgoCdOperator,
    ];
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceSpec {
    #[serde(default)]
    pub role: Option<ServiceRole>,
    /// Supervisor Service ID, e.g. `velero.vsphere.vmware.com`
    pub id: String,
    pub version: String,
    /// Carvel package YAML used to register the service when vCenter doesn't know it yet
    #[serde(default)]
    pub definition: Option<PathBuf>,
    /// YAML configuration passed to the service on install
    #[serde(default)]
    pub values: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArgoCdConfig {
    /// vSphere Namespace the instance is created in
    pub namespace: String,
    #[serde(default = "default_argocd_instance_name")]
    pub instance_name: String,
    pub version: String,
    /// Custom instance manifest, the embedded template is used when absent
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

fn default_argocd_instance_name() -> String {
    "argocd".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Timeouts {
    pub supervisor_minutes: u64,
    pub service_minutes: u64,
    pub argocd_minutes: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            supervisor_minutes: 60,
            service_minutes: 20,
            argocd_minutes: 15,
        }
    }
}

impl Timeouts {
    pub fn supervisor(&self) -> Duration {
        minutes(self.supervisor_minutes)
    }

    pub fn service(&self) -> Duration {
        minutes(self.service_minutes)
    }

    pub fn argocd(&self) -> Duration {
        minutes(self.argocd_minutes)
    }

    fn validate(&self, problems: &mut Problems) {
        for (field, value) in [
            ("timeouts.supervisorMinutes", self.supervisor_minutes),
            ("timeouts.serviceMinutes", self.service_minutes),
            ("timeouts.argocdMinutes", self.argocd_minutes),
        ] {
            if !(1..=MAX_TIMEOUT_MINUTES).contains(&value) {
                problems.push(format!(
                    "{field} must be between 1 and {MAX_TIMEOUT_MINUTES}, got {value}"
                ));
            }
        }
    }
}

fn minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

fn resolve(base_dir: &Path, path: &mut Option<PathBuf>) {
    if let Some(p) = path.as_mut() {
        if p.is_relative() {
            *p = base_dir.join(&*p);
        }
    }
}

fn require_file(problems: &mut Problems, field: &str, path: &Option<PathBuf>) {
    if let Some(path) = path {
        if !path.is_file() {
            problems.push(format!("{field} file {path:?} does not exist"));
        }
    }
}

impl SupervisorConfig {
    #[cfg(test)]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Makes relative file references absolute using the directory `supervisor.json` lives in.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        for service in &mut self.services {
            resolve(base_dir, &mut service.definition);
            resolve(base_dir, &mut service.values);
        }
        resolve(base_dir, &mut self.argocd.manifest);
    }

    /// Services in install order: the required roles in dependency order, followed by any
    /// additional services in the order they were listed.
    pub fn services_in_install_order(&self) -> Vec<&ServiceSpec> {
        let mut services: Vec<&ServiceSpec> = self.services.iter().collect();
        // `None` sorts after every role and the sort is stable
        services.sort_by_key(|service| (service.role.is_none(), service.role));
        services
    }

    /// Subnets of the four networks plus the service CIDR, labelled for error messages.
    pub fn subnets(&self) -> Vec<(&'static str, Ipv4Cidr)> {
        let mut subnets = Vec::new();

        if let Some(subnet) = self.management_network.subnet() {
            subnets.push(("managementNetwork", subnet));
        }
        if let Some(subnet) = self.workload_network.subnet() {
            subnets.push(("workloadNetwork", subnet));
        }
        if let Some(subnet) = self.load_balancer.management_network.subnet() {
            subnets.push(("loadBalancer.managementNetwork", subnet));
        }
        if let Some(subnet) = self.load_balancer.virtual_ip_network.subnet() {
            subnets.push(("loadBalancer.virtualIpNetwork", subnet));
        }
        subnets.push(("serviceCidr", self.service_cidr));

        subnets
    }

    pub(super) fn validate(&self, problems: &mut Problems) {
        require_dns_label(problems, "name", &self.name);
        require_non_empty(problems, "storagePolicy", &self.storage_policy);

        if self.control_plane.count != SINGLE_NODE_CONTROL_PLANE_COUNT {
            problems.push(format!(
                "controlPlane.count must be {SINGLE_NODE_CONTROL_PLANE_COUNT} for a single-node Supervisor, got {}",
                self.control_plane.count
            ));
        }

        self.management_network
            .validate(problems, "managementNetwork", MIN_MANAGEMENT_ADDRESSES);
        self.workload_network
            .validate(problems, "workloadNetwork", 1);
        self.load_balancer.validate(problems);

        let subnets = self.subnets();
        for (i, (name, subnet)) in subnets.iter().enumerate() {
            for (other_name, other) in &subnets[i + 1..] {
                if subnet.overlaps(other) {
                    problems.push(format!(
                        "{name} ({}) overlaps {other_name} ({}), each network needs its own subnet",
                        subnet.to_network_string(),
                        other.to_network_string()
                    ));
                }
            }
        }

        if self.dns_servers.is_empty() {
            problems.push("dnsServers must contain at least one server".to_string());
        }

        if self.ntp_servers.is_empty() {
            problems.push("ntpServers must contain at least one server".to_string());
        }
        for ntp_server in &self.ntp_servers {
            require_non_empty(problems, "ntpServers entry", ntp_server);
        }
        for search_domain in &self.search_domains {
            require_non_empty(problems, "searchDomains entry", search_domain);
        }

        self.validate_services(problems);

        require_dns_label(problems, "argocd.namespace", &self.argocd.namespace);
        require_dns_label(problems, "argocd.instanceName", &self.argocd.instance_name);
        require_non_empty(problems, "argocd.version", &self.argocd.version);
        require_file(problems, "argocd.manifest", &self.argocd.manifest);

        self.timeouts.validate(problems);
    }

    fn validate_services(&self, problems: &mut Problems) {
        let mut seen_ids = HashSet::new();
        for service in &self.services {
            require_non_empty(problems, "services[].id", &service.id);
            require_non_empty(problems, "services[].version", &service.version);

            if !seen_ids.insert(service.id.as_str()) {
                problems.push(format!("services lists '{}' more than once", service.id));
            }

            require_file(problems, "services[].definition", &service.definition);
            require_file(problems, "services[].values", &service.values);
        }

        for role in ServiceRole::REQUIRED {
            let count = self
                .services
                .iter()
                .filter(|service| service.role == Some(role))
                .count();

            match count {
                1 => {}
                0 => problems.push(format!("services is missing the {role} service")),
                n => problems.push(format!(
                    "services lists {n} services for the {role} role, expected exactly one"
                )),
            }
        }
    }
}
