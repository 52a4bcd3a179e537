use super::report;
use crate::backend::Backend;
use crate::config::Config;

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Creates the vLCM managed cluster, adds the host and turns on cluster services.
pub async fn run(backend: &dyn Backend, config: &Config) -> anyhow::Result<()> {
    let infrastructure = &config.infrastructure;
    let cluster = &infrastructure.cluster;

    let outcome = backend
        .ensure_cluster(&infrastructure.datacenter, cluster)
        .await?;
    report(format_args!("Cluster {}", cluster.name), outcome);

    let outcome = backend
        .ensure_host_in_cluster(&cluster.name, &infrastructure.host)
        .await?;
    report(format_args!("Host {}", infrastructure.host.hostname), outcome);

    backend.configure_cluster(cluster).await?;
    println!(
        "Cluster {} configured with DRS {} and HA {}",
        cluster.name,
        on_off(cluster.drs),
        on_off(cluster.ha)
    );

    Ok(())
}
