use super::report;
use crate::backend::Backend;
use crate::config::Config;

/// Formats the host's disk as a VMFS datastore and creates the tag based policy selecting it.
pub async fn run(backend: &dyn Backend, config: &Config) -> anyhow::Result<()> {
    let infrastructure = &config.infrastructure;
    let storage = &infrastructure.storage;

    let outcome = backend
        .ensure_datastore(&infrastructure.host.hostname, storage)
        .await?;
    report(
        format_args!(
            "Datastore {} on {}",
            storage.datastore_name, storage.disk_canonical_name
        ),
        outcome,
    );

    let outcome = backend.ensure_storage_policy(storage).await?;
    report(
        format_args!(
            "Storage policy {} (tag {} in category {})",
            storage.policy_name,
            storage.tag(),
            storage.tag_category
        ),
        outcome,
    );

    Ok(())
}
