//! An in-memory [`Backend`] recording every call, for testing stage ordering and idempotency.

use std::{collections::HashSet, sync::Mutex, time::Duration};

use async_trait::async_trait;

use super::{Backend, Outcome};
use crate::config::{
    ClusterConfig, Config, HostConfig, NetworkConfig, PortGroup, ServiceSpec, StorageConfig,
};

pub const SUPERVISOR_ID: &str = "supervisor-1";

#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<String>>,
    /// Operations which find their object already present
    existing: HashSet<&'static str>,
    failing: Option<&'static str>,
    missing: HashSet<&'static str>,
    supervisor: Mutex<Option<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn existing(mut self, operation: &'static str) -> Self {
        self.existing.insert(operation);
        self
    }

    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.failing = Some(operation);
        self
    }

    /// Makes a precondition lookup, `datacenter_exists` or `base_image_available`, come back
    /// empty.
    pub fn missing(mut self, lookup: &'static str) -> Self {
        self.missing.insert(lookup);
        self
    }

    pub fn with_supervisor(self) -> Self {
        *self.supervisor.lock().unwrap() = Some(SUPERVISOR_ID.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of the operations called, without their arguments.
    pub fn operations(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| call.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    fn record(&self, operation: &'static str, arguments: &[&str]) -> anyhow::Result<()> {
        let mut call = operation.to_string();
        for argument in arguments {
            call.push(' ');
            call.push_str(argument);
        }
        self.calls.lock().unwrap().push(call);

        if self.failing == Some(operation) {
            anyhow::bail!("{operation} failed");
        }

        Ok(())
    }

    fn outcome(&self, operation: &'static str) -> Outcome {
        if self.existing.contains(operation) {
            Outcome::Existing
        } else {
            Outcome::Created
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn datacenter_exists(&self, datacenter: &str) -> anyhow::Result<bool> {
        self.record("datacenter_exists", &[datacenter])?;
        Ok(!self.missing.contains("datacenter_exists"))
    }

    async fn base_image_available(&self, version: &str) -> anyhow::Result<bool> {
        self.record("base_image_available", &[version])?;
        Ok(!self.missing.contains("base_image_available"))
    }

    async fn ensure_cluster(
        &self,
        datacenter: &str,
        cluster: &ClusterConfig,
    ) -> anyhow::Result<Outcome> {
        self.record("ensure_cluster", &[datacenter, cluster.name.as_str()])?;
        Ok(self.outcome("ensure_cluster"))
    }

    async fn ensure_host_in_cluster(
        &self,
        cluster: &str,
        host: &HostConfig,
    ) -> anyhow::Result<Outcome> {
        self.record("ensure_host_in_cluster", &[cluster, host.hostname.as_str()])?;
        Ok(self.outcome("ensure_host_in_cluster"))
    }

    async fn configure_cluster(&self, cluster: &ClusterConfig) -> anyhow::Result<()> {
        self.record("configure_cluster", &[cluster.name.as_str()])
    }

    async fn ensure_switch(
        &self,
        datacenter: &str,
        hostname: &str,
        network: &NetworkConfig,
    ) -> anyhow::Result<Outcome> {
        self.record("ensure_switch", &[datacenter, hostname, network.switch_name.as_str()])?;
        Ok(self.outcome("ensure_switch"))
    }

    async fn ensure_port_group(
        &self,
        switch_name: &str,
        port_group: &PortGroup,
    ) -> anyhow::Result<Outcome> {
        self.record(
            "ensure_port_group",
            &[switch_name, port_group.name.as_str(), port_group.vlan_id.to_string().as_str()],
        )?;
        Ok(self.outcome("ensure_port_group"))
    }

    async fn ensure_datastore(
        &self,
        hostname: &str,
        storage: &StorageConfig,
    ) -> anyhow::Result<Outcome> {
        self.record("ensure_datastore", &[hostname, storage.datastore_name.as_str()])?;
        Ok(self.outcome("ensure_datastore"))
    }

    async fn ensure_storage_policy(&self, storage: &StorageConfig) -> anyhow::Result<Outcome> {
        self.record("ensure_storage_policy", &[storage.policy_name.as_str()])?;
        Ok(self.outcome("ensure_storage_policy"))
    }

    async fn find_supervisor(&self, name: &str) -> anyhow::Result<Option<String>> {
        self.record("find_supervisor", &[name])?;
        Ok(self.supervisor.lock().unwrap().clone())
    }

    async fn enable_supervisor(&self, config: &Config) -> anyhow::Result<String> {
        self.record("enable_supervisor", &[config.supervisor.name.as_str()])?;
        *self.supervisor.lock().unwrap() = Some(SUPERVISOR_ID.to_string());
        Ok(SUPERVISOR_ID.to_string())
    }

    async fn wait_for_supervisor(
        &self,
        supervisor: &str,
        _timeout: Duration,
    ) -> anyhow::Result<()> {
        self.record("wait_for_supervisor", &[supervisor])
    }

    async fn service_registered(&self, service_id: &str, version: &str) -> anyhow::Result<bool> {
        self.record("service_registered", &[service_id, version])?;
        Ok(self.existing.contains("register_service"))
    }

    async fn register_service(&self, _service_id: &str, definition: &str) -> anyhow::Result<()> {
        // Record the package name rather than the whole YAML
        let name = definition
            .lines()
            .find_map(|line| line.trim().strip_prefix("refName:"))
            .unwrap_or("<unnamed>")
            .trim();
        self.record("register_service", &[name])
    }

    async fn service_installed(
        &self,
        supervisor: &str,
        service_id: &str,
    ) -> anyhow::Result<bool> {
        self.record("service_installed", &[supervisor, service_id])?;
        Ok(self.existing.contains("install_service"))
    }

    async fn install_service(
        &self,
        supervisor: &str,
        service: &ServiceSpec,
        values: Option<&str>,
    ) -> anyhow::Result<()> {
        let values = if values.is_some() { "with-values" } else { "no-values" };
        self.record(
            "install_service",
            &[supervisor, service.id.as_str(), service.version.as_str(), values],
        )
    }

    async fn wait_for_service(
        &self,
        supervisor: &str,
        service_id: &str,
        _timeout: Duration,
    ) -> anyhow::Result<()> {
        self.record("wait_for_service", &[supervisor, service_id])
    }

    async fn ensure_namespace(
        &self,
        supervisor: &str,
        namespace: &str,
        storage_policy: &str,
    ) -> anyhow::Result<Outcome> {
        self.record("ensure_namespace", &[supervisor, namespace, storage_policy])?;
        Ok(self.outcome("ensure_namespace"))
    }

    async fn login_to_supervisor(
        &self,
        cluster: &str,
        supervisor_name: &str,
        namespace: &str,
    ) -> anyhow::Result<String> {
        self.record("login_to_supervisor", &[cluster, supervisor_name, namespace])?;
        Ok(format!("{supervisor_name}:{namespace}"))
    }

    async fn apply_manifest(
        &self,
        context: &str,
        namespace: &str,
        manifest: &str,
    ) -> anyhow::Result<()> {
        let kind = manifest
            .lines()
            .find_map(|line| line.strip_prefix("kind:"))
            .unwrap_or("<unknown>")
            .trim();
        self.record("apply_manifest", &[context, namespace, kind])
    }

    async fn wait_for_deployments(
        &self,
        context: &str,
        namespace: &str,
        selector: &str,
        _timeout: Duration,
    ) -> anyhow::Result<()> {
        self.record("wait_for_deployments", &[context, namespace, selector])
    }
}
