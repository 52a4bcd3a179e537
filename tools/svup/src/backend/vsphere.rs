use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use base64::prelude::*;
use common::secret::Secret;

use super::{Backend, Outcome};
use crate::config::{
    ClusterConfig, Config, HostConfig, InfrastructureConfig, NetworkConfig, NetworkRole, PortGroup,
    ServiceSpec, StorageConfig,
};
use crate::error::ProvisionError;
use crate::kubectl::Kubectl;
use crate::powercli::{self, PowerCli, HOST_PASSWORD_ENV};
use crate::vcenter::{
    enable_spec,
    models::{
        describe_messages, NamespaceCreateSpec, ServiceConfigStatus, StorageSpec,
        SupervisorConfigStatus, SupervisorServiceInstallSpec,
    },
    SupervisorObjectIds, VcenterClient,
};
use crate::vcf::{namespace_context, Vcf};
use crate::wait::{poll_until, Progress, POLL_INTERVAL};

/// Drives a real vCenter: REST for lookups and namespace management, PowerCLI for inventory
/// changes and the VCF CLI plus kubectl for the Supervisor's Kubernetes API.
pub struct VsphereBackend {
    vcenter: VcenterClient,
    powercli: PowerCli,
    vcf: Vcf,
    kubectl: Kubectl,
    username: String,
    password: Secret<String>,
    insecure: bool,
}

impl VsphereBackend {
    pub async fn connect(
        infrastructure: &InfrastructureConfig,
        kubeconfig: PathBuf,
    ) -> anyhow::Result<Self> {
        let vcenter_config = &infrastructure.vcenter;
        let vcenter = VcenterClient::login(vcenter_config).await?;

        Ok(Self {
            vcenter,
            powercli: PowerCli::new(vcenter_config),
            vcf: Vcf::new(kubeconfig.clone()),
            kubectl: Kubectl::new(kubeconfig),
            username: vcenter_config.username.clone(),
            password: vcenter_config.password.clone(),
            insecure: vcenter_config.insecure,
        })
    }

    pub async fn disconnect(&self) {
        if let Err(e) = self.vcenter.logout().await {
            tracing::warn!("Failed to log out of vCenter: {e}");
        }
    }

    async fn cluster_id(&self, name: &str) -> anyhow::Result<String> {
        self.vcenter
            .clusters_named(name)
            .await?
            .into_iter()
            .find(|cluster| cluster.name == name)
            .map(|cluster| cluster.cluster)
            .ok_or_else(|| ProvisionError::not_found("Cluster", name).into())
    }

    async fn port_group_id(&self, name: &str) -> anyhow::Result<String> {
        self.vcenter
            .port_groups_named(name)
            .await?
            .into_iter()
            .find(|network| network.name == name)
            .map(|network| network.network)
            .ok_or_else(|| ProvisionError::not_found("Distributed port group", name).into())
    }

    async fn storage_policy_id(&self, name: &str) -> anyhow::Result<String> {
        self.vcenter
            .storage_policies()
            .await?
            .into_iter()
            .find(|policy| policy.name == name)
            .map(|policy| policy.policy)
            .ok_or_else(|| ProvisionError::not_found("Storage policy", name).into())
    }

    async fn supervisor_object_ids(&self, config: &Config) -> anyhow::Result<SupervisorObjectIds> {
        Ok(SupervisorObjectIds {
            cluster: self.cluster_id(&config.infrastructure.cluster.name).await?,
            management_port_group: self
                .port_group_id(&config.port_group_name(NetworkRole::Management))
                .await?,
            workload_port_group: self
                .port_group_id(&config.port_group_name(NetworkRole::Workload))
                .await?,
            load_balancer_management_port_group: self
                .port_group_id(&config.port_group_name(NetworkRole::LoadBalancerManagement))
                .await?,
            virtual_ip_port_group: self
                .port_group_id(&config.port_group_name(NetworkRole::LoadBalancerVip))
                .await?,
            storage_policy: self
                .storage_policy_id(&config.supervisor.storage_policy)
                .await?,
        })
    }
}

#[async_trait]
impl Backend for VsphereBackend {
    async fn datacenter_exists(&self, datacenter: &str) -> anyhow::Result<bool> {
        let datacenters = self.vcenter.datacenters_named(datacenter).await?;

        Ok(datacenters.iter().any(|dc| dc.name == datacenter))
    }

    async fn base_image_available(&self, version: &str) -> anyhow::Result<bool> {
        let images = self.vcenter.base_images().await?;
        tracing::debug!(
            "Base images in depot: {:?}",
            images.iter().map(|image| &image.version).collect::<Vec<_>>()
        );

        Ok(images.iter().any(|image| image.version == version))
    }

    async fn ensure_cluster(
        &self,
        datacenter: &str,
        cluster: &ClusterConfig,
    ) -> anyhow::Result<Outcome> {
        let script = powercli::create_cluster(datacenter, cluster);

        self.powercli.ensure("create cluster", &script, &[]).await
    }

    async fn ensure_host_in_cluster(
        &self,
        cluster: &str,
        host: &HostConfig,
    ) -> anyhow::Result<Outcome> {
        let script = powercli::add_host(cluster, host);

        self.powercli
            .ensure("add host", &script, &[(HOST_PASSWORD_ENV, &host.password)])
            .await
    }

    async fn configure_cluster(&self, cluster: &ClusterConfig) -> anyhow::Result<()> {
        let script = powercli::configure_cluster(cluster);

        self.powercli.run("configure cluster", &script, &[]).await?;

        Ok(())
    }

    async fn ensure_switch(
        &self,
        datacenter: &str,
        hostname: &str,
        network: &NetworkConfig,
    ) -> anyhow::Result<Outcome> {
        let script = powercli::create_switch(datacenter, hostname, network);

        self.powercli.ensure("create switch", &script, &[]).await
    }

    async fn ensure_port_group(
        &self,
        switch_name: &str,
        port_group: &PortGroup,
    ) -> anyhow::Result<Outcome> {
        let script = powercli::create_port_group(switch_name, port_group);

        self.powercli.ensure("create port group", &script, &[]).await
    }

    async fn ensure_datastore(
        &self,
        hostname: &str,
        storage: &StorageConfig,
    ) -> anyhow::Result<Outcome> {
        let script = powercli::create_datastore(hostname, storage);

        self.powercli.ensure("create datastore", &script, &[]).await
    }

    async fn ensure_storage_policy(&self, storage: &StorageConfig) -> anyhow::Result<Outcome> {
        let script = powercli::create_storage_policy(storage);

        self.powercli
            .ensure("create storage policy", &script, &[])
            .await
    }

    async fn find_supervisor(&self, name: &str) -> anyhow::Result<Option<String>> {
        let summaries = self.vcenter.supervisor_summaries().await?;

        Ok(summaries
            .items
            .into_iter()
            .find(|item| item.info.name == name)
            .map(|item| item.supervisor))
    }

    async fn enable_supervisor(&self, config: &Config) -> anyhow::Result<String> {
        let ids = self.supervisor_object_ids(config).await?;
        tracing::debug!("Enabling Supervisor with {ids:?}");

        let spec = enable_spec(config, &ids);

        self.vcenter
            .enable_on_compute_cluster(&ids.cluster, &spec)
            .await
    }

    async fn wait_for_supervisor(
        &self,
        supervisor: &str,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let what = format!("Supervisor {supervisor} to be running");

        poll_until(&what, timeout, POLL_INTERVAL, || async move {
            let info = self.vcenter.supervisor_summary(supervisor).await?;

            match info.config_status {
                SupervisorConfigStatus::Running => Ok(Progress::Done),
                SupervisorConfigStatus::Error => Err(ProvisionError::Failed {
                    what: format!("Supervisor {}", info.name),
                    detail: describe_messages(&info.messages),
                }
                .into()),
                status => Ok(Progress::Pending(match info.kubernetes_status {
                    Some(kubernetes_status) => format!("{status}, Kubernetes {kubernetes_status}"),
                    None => status.to_string(),
                })),
            }
        })
        .await
    }

    async fn service_registered(&self, service_id: &str, version: &str) -> anyhow::Result<bool> {
        self.vcenter
            .supervisor_service_version_exists(service_id, version)
            .await
    }

    async fn register_service(&self, service_id: &str, definition: &str) -> anyhow::Result<()> {
        self.vcenter.register_carvel_package(service_id, definition).await
    }

    async fn service_installed(
        &self,
        supervisor: &str,
        service_id: &str,
    ) -> anyhow::Result<bool> {
        let installed = self
            .vcenter
            .installed_supervisor_service(supervisor, service_id)
            .await?;

        Ok(installed.is_some())
    }

    async fn install_service(
        &self,
        supervisor: &str,
        service: &ServiceSpec,
        values: Option<&str>,
    ) -> anyhow::Result<()> {
        let spec = SupervisorServiceInstallSpec {
            supervisor_service: service.id.clone(),
            version: service.version.clone(),
            yaml_service_config: values.map(|values| BASE64_STANDARD.encode(values)),
        };

        self.vcenter
            .install_supervisor_service(supervisor, &spec)
            .await
    }

    async fn wait_for_service(
        &self,
        supervisor: &str,
        service_id: &str,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let what = format!("Supervisor Service {service_id} to be configured");

        poll_until(&what, timeout, POLL_INTERVAL, || async move {
            let Some(info) = self
                .vcenter
                .installed_supervisor_service(supervisor, service_id)
                .await?
            else {
                return Ok(Progress::Pending("not installed yet".to_string()));
            };

            match info.config_status {
                ServiceConfigStatus::Configured => Ok(Progress::Done),
                ServiceConfigStatus::Error => Err(ProvisionError::Failed {
                    what: format!("Supervisor Service {service_id}"),
                    detail: describe_messages(&info.messages),
                }
                .into()),
                status => Ok(Progress::Pending(status.to_string())),
            }
        })
        .await
    }

    async fn ensure_namespace(
        &self,
        supervisor: &str,
        namespace: &str,
        storage_policy: &str,
    ) -> anyhow::Result<Outcome> {
        if self.vcenter.namespace_exists(namespace).await? {
            return Ok(Outcome::Existing);
        }

        let spec = NamespaceCreateSpec {
            namespace: namespace.to_string(),
            supervisor: supervisor.to_string(),
            storage_specs: vec![StorageSpec {
                policy: self.storage_policy_id(storage_policy).await?,
            }],
        };

        self.vcenter.create_namespace(&spec).await?;

        Ok(Outcome::Created)
    }

    async fn login_to_supervisor(
        &self,
        cluster: &str,
        supervisor_name: &str,
        namespace: &str,
    ) -> anyhow::Result<String> {
        let cluster_id = self.cluster_id(cluster).await?;
        let info = self.vcenter.namespace_management_cluster(&cluster_id).await?;

        let Some(endpoint) = info.api_server_cluster_endpoint else {
            return Err(ProvisionError::Failed {
                what: format!("Logging in to Supervisor {supervisor_name}"),
                detail: "vCenter reports no API endpoint for it".to_string(),
            }
            .into());
        };

        self.vcf
            .create_context(
                supervisor_name,
                &endpoint,
                &self.username,
                &self.password,
                self.insecure,
            )
            .await?;

        Ok(namespace_context(supervisor_name, namespace))
    }

    async fn apply_manifest(
        &self,
        context: &str,
        namespace: &str,
        manifest: &str,
    ) -> anyhow::Result<()> {
        self.kubectl
            .apply(context, namespace, manifest.to_string())
            .await
    }

    async fn wait_for_deployments(
        &self,
        context: &str,
        namespace: &str,
        selector: &str,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let what = format!("deployments matching {selector} in {namespace} to roll out");

        poll_until(&what, timeout, POLL_INTERVAL, || async move {
            let deployments = self.kubectl.deployments(context, namespace, selector).await?;

            Ok(deployments.availability())
        })
        .await
    }
}
