//! The operations stages perform against vSphere and the Supervisor.
//!
//! Stages only talk to a [`Backend`], which keeps their ordering and idempotency logic testable
//! without a vCenter.

#[cfg(test)]
pub mod fake;
mod vsphere;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{
    ClusterConfig, Config, HostConfig, NetworkConfig, PortGroup, ServiceSpec, StorageConfig,
};

pub use vsphere::VsphereBackend;

/// What an `ensure_*` operation found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Outcome {
    #[strum(serialize = "created")]
    Created,
    #[strum(serialize = "already exists")]
    Existing,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn datacenter_exists(&self, datacenter: &str) -> anyhow::Result<bool>;
    async fn base_image_available(&self, version: &str) -> anyhow::Result<bool>;

    async fn ensure_cluster(
        &self,
        datacenter: &str,
        cluster: &ClusterConfig,
    ) -> anyhow::Result<Outcome>;
    async fn ensure_host_in_cluster(
        &self,
        cluster: &str,
        host: &HostConfig,
    ) -> anyhow::Result<Outcome>;
    /// Applies DRS and HA settings, converging on the configuration every time.
    async fn configure_cluster(&self, cluster: &ClusterConfig) -> anyhow::Result<()>;

    async fn ensure_switch(
        &self,
        datacenter: &str,
        hostname: &str,
        network: &NetworkConfig,
    ) -> anyhow::Result<Outcome>;
    async fn ensure_port_group(
        &self,
        switch_name: &str,
        port_group: &PortGroup,
    ) -> anyhow::Result<Outcome>;

    async fn ensure_datastore(
        &self,
        hostname: &str,
        storage: &StorageConfig,
    ) -> anyhow::Result<Outcome>;
    async fn ensure_storage_policy(&self, storage: &StorageConfig) -> anyhow::Result<Outcome>;

    /// The ID of the Supervisor with the given name, if one exists.
    async fn find_supervisor(&self, name: &str) -> anyhow::Result<Option<String>>;
    /// Starts enabling the Supervisor and returns its ID without waiting for it.
    async fn enable_supervisor(&self, config: &Config) -> anyhow::Result<String>;
    async fn wait_for_supervisor(&self, supervisor: &str, timeout: Duration)
        -> anyhow::Result<()>;

    /// Whether this version of the Supervisor Service is registered with vCenter.
    async fn service_registered(&self, service_id: &str, version: &str) -> anyhow::Result<bool>;
    /// Registers a Supervisor Service version from its Carvel package YAML.
    async fn register_service(&self, service_id: &str, definition: &str) -> anyhow::Result<()>;
    async fn service_installed(&self, supervisor: &str, service_id: &str)
        -> anyhow::Result<bool>;
    async fn install_service(
        &self,
        supervisor: &str,
        service: &ServiceSpec,
        values: Option<&str>,
    ) -> anyhow::Result<()>;
    async fn wait_for_service(
        &self,
        supervisor: &str,
        service_id: &str,
        timeout: Duration,
    ) -> anyhow::Result<()>;

    async fn ensure_namespace(
        &self,
        supervisor: &str,
        namespace: &str,
        storage_policy: &str,
    ) -> anyhow::Result<Outcome>;
    /// Logs in to the Supervisor enabled on `cluster` and returns the kubeconfig context of
    /// `namespace`.
    async fn login_to_supervisor(
        &self,
        cluster: &str,
        supervisor_name: &str,
        namespace: &str,
    ) -> anyhow::Result<String>;
    async fn apply_manifest(
        &self,
        context: &str,
        namespace: &str,
        manifest: &str,
    ) -> anyhow::Result<()>;
    async fn wait_for_deployments(
        &self,
        context: &str,
        namespace: &str,
        selector: &str,
        timeout: Duration,
    ) -> anyhow::Result<()>;
}
