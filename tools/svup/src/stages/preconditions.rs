use crate::backend::Backend;
use crate::config::Config;
use crate::error::ProvisionError;

/// Checks what svup cannot create itself: the datacenter and the ESX image in the depot.
pub async fn check(backend: &dyn Backend, config: &Config) -> anyhow::Result<()> {
    let infrastructure = &config.infrastructure;

    if !backend.datacenter_exists(&infrastructure.datacenter).await? {
        return Err(ProvisionError::DatacenterNotFound(infrastructure.datacenter.clone()).into());
    }

    let version = &infrastructure.cluster.esx_image_version;
    if !backend.base_image_available(version).await? {
        return Err(ProvisionError::BaseImageNotFound(version.clone()).into());
    }

    println!(
        "Datacenter {} and ESX base image {version} are available",
        infrastructure.datacenter
    );

    Ok(())
}
