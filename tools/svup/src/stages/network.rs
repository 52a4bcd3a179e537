use super::report;
use crate::backend::Backend;
use crate::config::Config;

/// Creates the distributed switch with the host's uplinks and one port group per Supervisor
/// network.
pub async fn run(backend: &dyn Backend, config: &Config) -> anyhow::Result<()> {
    let infrastructure = &config.infrastructure;
    let network = &infrastructure.network;

    let outcome = backend
        .ensure_switch(
            &infrastructure.datacenter,
            &infrastructure.host.hostname,
            network,
        )
        .await?;
    report(
        format_args!(
            "Distributed switch {} (MTU {}, uplinks {})",
            network.switch_name,
            network.mtu,
            network.uplinks.join(", ")
        ),
        outcome,
    );

    for port_group in network.port_groups() {
        let outcome = backend
            .ensure_port_group(&network.switch_name, &port_group)
            .await?;

        report(
            format_args!(
                "Port group {} for the {} network (VLAN {})",
                port_group.name, port_group.role, port_group.vlan_id
            ),
            outcome,
        );
    }

    Ok(())
}
