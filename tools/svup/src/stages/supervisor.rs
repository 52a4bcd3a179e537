use std::time::Duration;

use anyhow::Context;

use super::report;
use crate::backend::{Backend, Outcome};
use crate::config::{Config, ServiceSpec};

/// Enables the Supervisor unless it already exists, waits for it to run and then installs the
/// Supervisor Services in dependency order.
pub async fn run(backend: &dyn Backend, config: &Config) -> anyhow::Result<()> {
    let supervisor = &config.supervisor;

    let supervisor_id = match backend.find_supervisor(&supervisor.name).await? {
        Some(id) => {
            report(format_args!("Supervisor {}", supervisor.name), Outcome::Existing);
            id
        }
        None => {
            let id = backend.enable_supervisor(config).await?;
            report(format_args!("Supervisor {}", supervisor.name), Outcome::Created);
            id
        }
    };

    backend
        .wait_for_supervisor(&supervisor_id, supervisor.timeouts.supervisor())
        .await?;
    println!("Supervisor {} is running", supervisor.name);

    for service in supervisor.services_in_install_order() {
        install_service(backend, &supervisor_id, service, supervisor.timeouts.service())
            .await
            .with_context(|| format!("Failed to install Supervisor Service {}", service.id))?;
    }

    Ok(())
}

async fn install_service(
    backend: &dyn Backend,
    supervisor_id: &str,
    service: &ServiceSpec,
    timeout: Duration,
) -> anyhow::Result<()> {
    let name = match service.role {
        Some(role) => format!("{role} ({})", service.id),
        None => service.id.clone(),
    };

    // Services without a definition ship with vCenter and are always registered
    if let Some(definition_path) = &service.definition {
        if backend
            .service_registered(&service.id, &service.version)
            .await?
        {
            report(format_args!("{name} definition"), Outcome::Existing);
        } else {
            let definition = tokio::fs::read_to_string(definition_path)
                .await
                .with_context(|| format!("Failed to read {definition_path:?}"))?;

            backend.register_service(&service.id, &definition).await?;
            report(format_args!("{name} definition"), Outcome::Created);
        }
    }

    if backend.service_installed(supervisor_id, &service.id).await? {
        report(format_args!("{name} {}", service.version), Outcome::Existing);
    } else {
        let values = match &service.values {
            Some(values_path) => Some(
                tokio::fs::read_to_string(values_path)
                    .await
                    .with_context(|| format!("Failed to read {values_path:?}"))?,
            ),
            None => None,
        };

        backend
            .install_service(supervisor_id, service, values.as_deref())
            .await?;
        report(format_args!("{name} {}", service.version), Outcome::Created);
    }

    backend
        .wait_for_service(supervisor_id, &service.id, timeout)
        .await?;
    println!("{name} is configured");

    Ok(())
}
