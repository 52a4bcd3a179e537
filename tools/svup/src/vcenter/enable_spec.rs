use super::models::{
    ControlPlaneNetwork, ControlPlaneSpec, DeploymentTarget, DnsSpec, DvpgNetwork,
    EnableOnComputeClusterSpec, EdgeSpec, FoundationLoadBalancer, IpAssignment, IpManagement,
    IpRangeSpec, LoadBalancerInterface, LoadBalancerIpConfig, LoadBalancerNetwork, NetworkBacking,
    NetworkServices, NtpSpec, VsphereNetwork, WorkloadNetwork, WorkloadStorage, WorkloadsSpec,
};
use crate::config::{Config, Ipv4Cidr, NetworkRole, NetworkSpec};

/// vCenter identifiers of the objects the Supervisor is built from, looked up by name.
#[derive(Debug, Clone)]
pub struct SupervisorObjectIds {
    pub cluster: String,
    pub management_port_group: String,
    pub workload_port_group: String,
    pub load_balancer_management_port_group: String,
    pub virtual_ip_port_group: String,
    pub storage_policy: String,
}

fn range(network: &NetworkSpec) -> IpRangeSpec {
    IpRangeSpec {
        address: network.starting_address.to_string(),
        count: u32::from(network.address_count),
    }
}

fn cidr_range(cidr: &Ipv4Cidr) -> IpRangeSpec {
    IpRangeSpec {
        address: cidr.network().to_string(),
        count: u32::try_from(cidr.size()).unwrap_or(u32::MAX),
    }
}

fn network_services(config: &Config) -> NetworkServices {
    let supervisor = &config.supervisor;

    NetworkServices {
        dns: DnsSpec {
            servers: supervisor
                .dns_servers
                .iter()
                .map(|server| server.to_string())
                .collect(),
            search_domains: supervisor.search_domains.clone(),
        },
        ntp: NtpSpec {
            servers: supervisor.ntp_servers.clone(),
        },
    }
}

fn load_balancer_interface(
    persona: &'static str,
    name: String,
    port_group: &str,
    network: &NetworkSpec,
) -> LoadBalancerInterface {
    LoadBalancerInterface {
        personas: vec![persona],
        network: LoadBalancerNetwork {
            network_type: "DVPG",
            dvpg_network: DvpgNetwork {
                name,
                network: port_group.to_string(),
                ipam: "STATIC",
                ip_config: LoadBalancerIpConfig {
                    ip_ranges: vec![range(network)],
                    gateway: network.gateway_cidr(),
                },
            },
        },
    }
}

/// Builds the request enabling a single-node Supervisor with the vSphere Foundation load
/// balancer on the distributed port groups created by the network stage.
pub fn enable_spec(config: &Config, ids: &SupervisorObjectIds) -> EnableOnComputeClusterSpec {
    let supervisor = &config.supervisor;
    let load_balancer = &supervisor.load_balancer;
    let virtual_ips = &load_balancer.virtual_ip_range;

    EnableOnComputeClusterSpec {
        name: supervisor.name.clone(),
        control_plane: ControlPlaneSpec {
            network: ControlPlaneNetwork {
                network: "management".to_string(),
                backing: NetworkBacking {
                    backing: "NETWORK",
                    network: ids.management_port_group.clone(),
                },
                services: network_services(config),
                ip_management: IpManagement {
                    dhcp_enabled: false,
                    gateway_address: supervisor.management_network.gateway_cidr(),
                    ip_assignments: vec![IpAssignment {
                        assignee: "NODE",
                        ranges: vec![range(&supervisor.management_network)],
                    }],
                },
            },
            size: supervisor.control_plane.size.to_string(),
            count: supervisor.control_plane.count,
            storage_policy: ids.storage_policy.clone(),
        },
        workloads: WorkloadsSpec {
            network: WorkloadNetwork {
                network: "workload".to_string(),
                network_type: "VSPHERE",
                vsphere: VsphereNetwork {
                    dvpg: ids.workload_port_group.clone(),
                },
                services: network_services(config),
                ip_management: IpManagement {
                    dhcp_enabled: false,
                    gateway_address: supervisor.workload_network.gateway_cidr(),
                    ip_assignments: vec![
                        IpAssignment {
                            assignee: "NODE",
                            ranges: vec![range(&supervisor.workload_network)],
                        },
                        IpAssignment {
                            assignee: "SERVICE",
                            ranges: vec![cidr_range(&supervisor.service_cidr)],
                        },
                    ],
                },
            },
            edge: EdgeSpec {
                id: format!("{}-lb", supervisor.name),
                provider: "VSPHERE_FOUNDATION",
                load_balancer_address_ranges: vec![IpRangeSpec {
                    address: virtual_ips.starting_address.to_string(),
                    count: u32::from(virtual_ips.address_count),
                }],
                foundation: FoundationLoadBalancer {
                    deployment_target: DeploymentTarget {
                        availability: "SINGLE_NODE",
                        storage_policy: ids.storage_policy.clone(),
                    },
                    size: load_balancer.size.to_string(),
                    interfaces: vec![
                        load_balancer_interface(
                            "MANAGEMENT",
                            config.port_group_name(NetworkRole::LoadBalancerManagement),
                            &ids.load_balancer_management_port_group,
                            &load_balancer.management_network,
                        ),
                        load_balancer_interface(
                            "FRONTEND",
                            config.port_group_name(NetworkRole::LoadBalancerVip),
                            &ids.virtual_ip_port_group,
                            &load_balancer.virtual_ip_network,
                        ),
                    ],
                },
            },
            storage: WorkloadStorage {
                ephemeral_storage_policy: ids.storage_policy.clone(),
                image_storage_policy: ids.storage_policy.clone(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;

    fn ids() -> SupervisorObjectIds {
        SupervisorObjectIds {
            cluster: "domain-c8".into(),
            management_port_group: "dvportgroup-11".into(),
            workload_port_group: "dvportgroup-12".into(),
            load_balancer_management_port_group: "dvportgroup-13".into(),
            virtual_ip_port_group: "dvportgroup-14".into(),
            storage_policy: "aa6d5a82-1c88-45da-85d3-3d74b91a5bad".into(),
        }
    }

    fn spec_json() -> serde_json::Value {
        let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        let config = crate::config::load(
            &fixtures.join("infrastructure.json"),
            &fixtures.join("supervisor.json"),
        )
        .unwrap();

        serde_json::to_value(enable_spec(&config, &ids())).unwrap()
    }

    #[test]
    fn control_plane_is_single_node_on_management_port_group() {
        let spec = spec_json();

        assert_eq!(spec["control_plane"]["count"], 1);
        assert_eq!(spec["control_plane"]["size"], "SMALL");
        assert_eq!(
            spec["control_plane"]["network"]["backing"]["network"],
            "dvportgroup-11"
        );
        assert_eq!(
            spec["control_plane"]["network"]["ip_management"],
            json!({
                "dhcp_enabled": false,
                "gateway_address": "10.10.10.1/24",
                "ip_assignments": [
                    { "assignee": "NODE", "ranges": [{ "address": "10.10.10.50", "count": 5 }] }
                ]
            })
        );
    }

    #[test]
    fn workload_network_assigns_nodes_and_services() {
        let spec = spec_json();
        let workload = &spec["workloads"]["network"];

        assert_eq!(workload["vsphere"]["dvpg"], "dvportgroup-12");
        assert_eq!(
            workload["ip_management"]["ip_assignments"][1],
            json!({ "assignee": "SERVICE", "ranges": [{ "address": "10.96.0.0", "count": 512 }] })
        );
        assert_eq!(workload["services"]["ntp"]["servers"], json!(["pool.ntp.org"]));
    }

    #[test]
    fn foundation_load_balancer_uses_both_load_balancer_port_groups() {
        let spec = spec_json();
        let edge = &spec["workloads"]["edge"];

        assert_eq!(edge["provider"], "VSPHERE_FOUNDATION");
        assert_eq!(
            edge["load_balancer_address_ranges"],
            json!([{ "address": "10.10.40.100", "count": 50 }])
        );
        assert_eq!(edge["foundation"]["deployment_target"]["availability"], "SINGLE_NODE");

        let interfaces = edge["foundation"]["interfaces"].as_array().unwrap();
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0]["personas"], json!(["MANAGEMENT"]));
        assert_eq!(
            interfaces[0]["network"]["dvpg_network"]["network"],
            "dvportgroup-13"
        );
        assert_eq!(interfaces[1]["personas"], json!(["FRONTEND"]));
        assert_eq!(
            interfaces[1]["network"]["dvpg_network"]["name"],
            "Supervisor-VDS-lb-vip"
        );
        assert_eq!(
            interfaces[1]["network"]["dvpg_network"]["ip_config"]["gateway"],
            "10.10.40.1/24"
        );
    }
}
