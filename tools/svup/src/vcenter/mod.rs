//! A small client for the vCenter REST API, covering lookups of inventory objects and the
//! namespace management endpoints used to run a Supervisor.

mod enable_spec;
pub mod models;

use common::clients::{
    handle_optional_response_json, handle_response, handle_response_json, new_reqwest_client,
};
use base64::prelude::*;
use common::secret::Secret;
use reqwest::{Client, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::VcenterConfig;

pub use enable_spec::{enable_spec, SupervisorObjectIds};
use models::{
    BaseImageSummary, CarvelCreateSpec, CarvelVersionSpec, ClusterSummary, DatacenterSummary,
    EnableOnComputeClusterSpec, InstalledServiceInfo, NamespaceCreateSpec,
    NamespaceManagementClusterInfo, NetworkSummary, StoragePolicySummary, SupervisorInfo,
    SupervisorServiceCreateSpec, SupervisorServiceInstallSpec, SupervisorServiceVersionCreateSpec,
    SupervisorSummaryList,
};

const SESSION_HEADER: &str = "vmware-api-session-id";

pub struct VcenterClient {
    client: Client,
    base_url: Url,
    session: Secret<String>,
}

impl VcenterClient {
    /// Creates an API session using the configured credentials.
    pub async fn login(vcenter: &VcenterConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&format!("https://{}/", vcenter.server))?;
        let client = new_reqwest_client(vcenter.insecure)?;

        Self::login_at(client, base_url, &vcenter.username, &vcenter.password).await
    }

    async fn login_at(
        client: Client,
        base_url: Url,
        username: &str,
        password: &Secret<String>,
    ) -> anyhow::Result<Self> {
        let url = endpoint(&base_url, &["api", "session"])?;

        let resp = client
            .post(url)
            .basic_auth(username, Some(password.expose()))
            .send()
            .await?;

        let session: String = handle_response_json(resp).await?;

        tracing::info!("Logged in to vCenter at {base_url} as {username}");

        Ok(Self {
            client,
            base_url,
            session: Secret::new(session),
        })
    }

    pub async fn logout(&self) -> anyhow::Result<()> {
        let url = self.endpoint(&["api", "session"])?;

        let resp = self.authenticated(self.client.delete(url)).send().await?;

        handle_response(resp).await
    }

    fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        endpoint(&self.base_url, segments)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(SESSION_HEADER, self.session.expose())
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> anyhow::Result<T> {
        let resp = self.authenticated(self.client.get(url)).send().await?;

        handle_response_json(resp).await
    }

    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> anyhow::Result<Option<T>> {
        let resp = self.authenticated(self.client.get(url)).send().await?;

        handle_optional_response_json(resp).await
    }

    async fn post<B: Serialize>(&self, url: Url, body: &B) -> anyhow::Result<()> {
        let resp = self
            .authenticated(self.client.post(url))
            .json(body)
            .send()
            .await?;

        handle_response(resp).await
    }

    pub async fn datacenters_named(&self, name: &str) -> anyhow::Result<Vec<DatacenterSummary>> {
        let mut url = self.endpoint(&["api", "vcenter", "datacenter"])?;
        url.query_pairs_mut().append_pair("names", name);

        self.get(url).await
    }

    pub async fn base_images(&self) -> anyhow::Result<Vec<BaseImageSummary>> {
        let url = self.endpoint(&["api", "esx", "settings", "depot-content", "base-images"])?;

        self.get(url).await
    }

    pub async fn clusters_named(&self, name: &str) -> anyhow::Result<Vec<ClusterSummary>> {
        let mut url = self.endpoint(&["api", "vcenter", "cluster"])?;
        url.query_pairs_mut().append_pair("names", name);

        self.get(url).await
    }

    /// Distributed port groups with the given name.
    pub async fn port_groups_named(&self, name: &str) -> anyhow::Result<Vec<NetworkSummary>> {
        let mut url = self.endpoint(&["api", "vcenter", "network"])?;
        url.query_pairs_mut()
            .append_pair("names", name)
            .append_pair("types", "DISTRIBUTED_PORTGROUP");

        self.get(url).await
    }

    pub async fn storage_policies(&self) -> anyhow::Result<Vec<StoragePolicySummary>> {
        let url = self.endpoint(&["api", "vcenter", "storage", "policies"])?;

        self.get(url).await
    }

    pub async fn supervisor_summaries(&self) -> anyhow::Result<SupervisorSummaryList> {
        let url = self.endpoint(&[
            "api",
            "vcenter",
            "namespace-management",
            "supervisors",
            "summaries",
        ])?;

        self.get(url).await
    }

    pub async fn supervisor_summary(&self, supervisor: &str) -> anyhow::Result<SupervisorInfo> {
        let url = self.endpoint(&[
            "api",
            "vcenter",
            "namespace-management",
            "supervisors",
            supervisor,
            "summary",
        ])?;

        self.get(url).await
    }

    /// Starts enabling a Supervisor on a cluster, returning the new Supervisor's ID.
    pub async fn enable_on_compute_cluster(
        &self,
        cluster: &str,
        spec: &EnableOnComputeClusterSpec,
    ) -> anyhow::Result<String> {
        let mut url = self.endpoint(&[
            "api",
            "vcenter",
            "namespace-management",
            "supervisors",
            cluster,
        ])?;
        url.query_pairs_mut()
            .append_pair("action", "enable_on_compute_cluster");

        let resp = self
            .authenticated(self.client.post(url))
            .json(spec)
            .send()
            .await?;

        handle_response_json(resp).await
    }

    pub async fn namespace_management_cluster(
        &self,
        cluster: &str,
    ) -> anyhow::Result<NamespaceManagementClusterInfo> {
        let url = self.endpoint(&["api", "vcenter", "namespace-management", "clusters", cluster])?;

        self.get(url).await
    }

    /// Whether vCenter knows a Supervisor Service with the given ID, in any version.
    pub async fn supervisor_service_exists(&self, service: &str) -> anyhow::Result<bool> {
        let url = self.endpoint(&[
            "api",
            "vcenter",
            "namespace-management",
            "supervisor-services",
            service,
        ])?;

        let info: Option<serde_json::Value> = self.get_optional(url).await?;

        Ok(info.is_some())
    }

    pub async fn supervisor_service_version_exists(
        &self,
        service: &str,
        version: &str,
    ) -> anyhow::Result<bool> {
        let url = self.endpoint(&[
            "api",
            "vcenter",
            "namespace-management",
            "supervisor-services",
            service,
            "versions",
            version,
        ])?;

        let info: Option<serde_json::Value> = self.get_optional(url).await?;

        Ok(info.is_some())
    }

    /// Registers a Carvel package, as a new Supervisor Service or as another version of an
    /// existing one.
    pub async fn register_carvel_package(&self, service: &str, package: &str) -> anyhow::Result<()> {
        let version_spec = CarvelVersionSpec {
            content: BASE64_STANDARD.encode(package),
        };

        if self.supervisor_service_exists(service).await? {
            tracing::debug!("Adding a version to Supervisor Service {service}");
            let url = self.endpoint(&[
                "api",
                "vcenter",
                "namespace-management",
                "supervisor-services",
                service,
                "versions",
            ])?;

            self.post(
                url,
                &SupervisorServiceVersionCreateSpec {
                    carvel_spec: version_spec,
                },
            )
            .await
        } else {
            let url = self.endpoint(&[
                "api",
                "vcenter",
                "namespace-management",
                "supervisor-services",
            ])?;

            self.post(
                url,
                &SupervisorServiceCreateSpec {
                    carvel_spec: CarvelCreateSpec { version_spec },
                },
            )
            .await
        }
    }

    pub async fn installed_supervisor_service(
        &self,
        supervisor: &str,
        service: &str,
    ) -> anyhow::Result<Option<InstalledServiceInfo>> {
        let url = self.endpoint(&[
            "api",
            "vcenter",
            "namespace-management",
            "supervisors",
            supervisor,
            "supervisor-services",
            service,
        ])?;

        self.get_optional(url).await
    }

    pub async fn install_supervisor_service(
        &self,
        supervisor: &str,
        spec: &SupervisorServiceInstallSpec,
    ) -> anyhow::Result<()> {
        let url = self.endpoint(&[
            "api",
            "vcenter",
            "namespace-management",
            "supervisors",
            supervisor,
            "supervisor-services",
        ])?;

        self.post(url, spec).await
    }

    pub async fn namespace_exists(&self, namespace: &str) -> anyhow::Result<bool> {
        let url = self.endpoint(&["api", "vcenter", "namespaces", "instances", "v2", namespace])?;

        let info: Option<serde_json::Value> = self.get_optional(url).await?;

        Ok(info.is_some())
    }

    pub async fn create_namespace(&self, spec: &NamespaceCreateSpec) -> anyhow::Result<()> {
        let url = self.endpoint(&["api", "vcenter", "namespaces", "instances", "v2"])?;

        self.post(url, spec).await
    }
}

fn endpoint(base_url: &Url, segments: &[&str]) -> anyhow::Result<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("{base_url} cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use super::*;

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Url::parse(&format!("http://{address}/")).unwrap()
    }

    fn session_of(headers: &HeaderMap) -> Option<&str> {
        headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
    }

    async fn login(base_url: Url) -> VcenterClient {
        VcenterClient::login_at(
            new_reqwest_client(false).unwrap(),
            base_url,
            "administrator@vsphere.local",
            &Secret::new("VMware1!".to_string()),
        )
        .await
        .unwrap()
    }

    #[test]
    fn endpoints_escape_segments() {
        let base_url = Url::parse("https://vc01.lab.local/").unwrap();

        let url = endpoint(&base_url, &["api", "vcenter", "namespaces", "instances", "v2", "a/b"]).unwrap();

        assert_eq!(
            url.as_str(),
            "https://vc01.lab.local/api/vcenter/namespaces/instances/v2/a%2Fb"
        );
    }

    #[tokio::test]
    async fn requests_carry_session_header() {
        let router = Router::new()
            .route(
                "/api/session",
                post(|headers: HeaderMap| async move {
                    assert!(headers.contains_key("authorization"));
                    Json(json!("session-123"))
                }),
            )
            .route(
                "/api/vcenter/cluster",
                get(
                    |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| async move {
                        if session_of(&headers) != Some("session-123") {
                            return (StatusCode::UNAUTHORIZED, Json(Value::Null));
                        }
                        let name = query.get("names").cloned().unwrap_or_default();
                        (
                            StatusCode::OK,
                            Json(json!([{ "cluster": "domain-c8", "name": name, "ha_enabled": true }])),
                        )
                    },
                ),
            );
        let client = login(serve(router).await).await;

        let clusters = client.clusters_named("Supervisor-Cluster").await.unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].cluster, "domain-c8");
        assert_eq!(clusters[0].name, "Supervisor-Cluster");
    }

    #[tokio::test]
    async fn missing_objects_are_none() {
        let router = Router::new()
            .route("/api/session", post(|| async { Json(json!("s")) }))
            .route(
                "/api/vcenter/namespaces/instances/v2/{namespace}",
                get(|| async { StatusCode::NOT_FOUND }),
            )
            .route(
                "/api/vcenter/namespace-management/supervisor-services/{service}",
                get(|| async { (StatusCode::OK, Json(json!({ "display_name": "Velero" }))) }),
            );
        let client = login(serve(router).await).await;

        assert!(!client.namespace_exists("argocd").await.unwrap());
        assert!(client
            .supervisor_service_exists("velero.vsphere.vmware.com")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn service_versions_are_looked_up_individually() {
        let router = Router::new()
            .route("/api/session", post(|| async { Json(json!("s")) }))
            .route(
                "/api/vcenter/namespace-management/supervisor-services/{service}/versions/{version}",
                get(
                    |Path((_, version)): Path<(String, String)>| async move {
                        if version == "1.5.3" {
                            (StatusCode::OK, Json(json!({ "version": version })))
                        } else {
                            (StatusCode::NOT_FOUND, Json(Value::Null))
                        }
                    },
                ),
            );
        let client = login(serve(router).await).await;

        assert!(client
            .supervisor_service_version_exists("velero.vsphere.vmware.com", "1.5.3")
            .await
            .unwrap());
        assert!(!client
            .supervisor_service_version_exists("velero.vsphere.vmware.com", "1.6.1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn package_for_known_service_is_added_as_a_version() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let versions = received.clone();
        let router = Router::new()
            .route("/api/session", post(|| async { Json(json!("s")) }))
            .route(
                "/api/vcenter/namespace-management/supervisor-services",
                post(|| async { StatusCode::CONFLICT }),
            )
            .route(
                "/api/vcenter/namespace-management/supervisor-services/{service}",
                get(|| async { Json(json!({ "display_name": "Velero" })) }),
            )
            .route(
                "/api/vcenter/namespace-management/supervisor-services/{service}/versions",
                post(move |Json(body): Json<Value>| {
                    let versions = versions.clone();
                    async move {
                        versions.lock().unwrap().push(body);
                        StatusCode::NO_CONTENT
                    }
                }),
            );
        let client = login(serve(router).await).await;

        client
            .register_carvel_package("velero.vsphere.vmware.com", "kind: Package")
            .await
            .unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0],
            json!({ "carvel_spec": { "content": BASE64_STANDARD.encode("kind: Package") } })
        );
    }

    #[tokio::test]
    async fn package_for_unknown_service_registers_the_service() {
        let router = Router::new()
            .route("/api/session", post(|| async { Json(json!("s")) }))
            .route(
                "/api/vcenter/namespace-management/supervisor-services",
                post(|Json(body): Json<Value>| async move {
                    assert!(body["carvel_spec"]["version_spec"]["content"].is_string());
                    StatusCode::NO_CONTENT
                }),
            )
            .route(
                "/api/vcenter/namespace-management/supervisor-services/{service}",
                get(|| async { StatusCode::NOT_FOUND }),
            );
        let client = login(serve(router).await).await;

        client
            .register_carvel_package("argocd-service.vsphere.vmware.com", "kind: Package")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn api_errors_are_reported() {
        let router = Router::new()
            .route("/api/session", post(|| async { Json(json!("s")) }))
            .route(
                "/api/vcenter/storage/policies",
                get(|| async { (StatusCode::FORBIDDEN, "Permission denied") }),
            );
        let client = login(serve(router).await).await;

        let error = client.storage_policies().await.unwrap_err();

        assert!(matches!(
            error.downcast_ref(),
            Some(common::Error::Api(status, text))
                if *status == StatusCode::FORBIDDEN && text == "Permission denied"
        ));
    }

    #[tokio::test]
    async fn failed_login_is_an_error() {
        let router = Router::new().route(
            "/api/session",
            post(|| async { (StatusCode::UNAUTHORIZED, "Authentication required") }),
        );

        let result = VcenterClient::login_at(
            new_reqwest_client(false).unwrap(),
            serve(router).await,
            "administrator@vsphere.local",
            &Secret::new("wrong".to_string()),
        )
        .await;

        assert!(result.is_err());
    }
}
