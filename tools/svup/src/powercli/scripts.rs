//! Script bodies run inside a PowerCLI session. Each looks its object up first and only creates
//! it when missing, so re-running a stage is harmless.

use super::{quote, RESULT_MARKER};
use crate::config::{ClusterConfig, HostConfig, NetworkConfig, PortGroup, StorageConfig};

/// Environment variable carrying the ESX root password into [`add_host`].
pub const HOST_PASSWORD_ENV: &str = "SVUP_HOST_PASSWORD";

fn report(result: &str) -> String {
    format!("Write-Output '{RESULT_MARKER}{result}'")
}

pub fn create_cluster(datacenter: &str, cluster: &ClusterConfig) -> String {
    let datacenter = quote(datacenter);
    let name = quote(&cluster.name);
    let version = quote(&cluster.esx_image_version);
    let created = report("created");
    let existing = report("existing");

    format!(
        r#"$datacenter = Get-Datacenter -Name {datacenter}
$cluster = Get-Cluster -Name {name} -Location $datacenter -ErrorAction SilentlyContinue
if ($cluster) {{
    {existing}
}} else {{
    $image = Get-LcmImage -Type BaseImage -Version {version}
    New-Cluster -Name {name} -Location $datacenter -BaseImage $image | Out-Null
    {created}
}}"#
    )
}

/// Applies the DRS and HA settings, which are set every run so the cluster converges on the
/// configuration.
pub fn configure_cluster(cluster: &ClusterConfig) -> String {
    let name = quote(&cluster.name);
    let drs = if cluster.drs {
        "-DrsEnabled:$true -DrsAutomationLevel FullyAutomated"
    } else {
        "-DrsEnabled:$false"
    };
    let ha = if cluster.ha {
        "-HAEnabled:$true"
    } else {
        "-HAEnabled:$false"
    };

    format!(
        r#"$cluster = Get-Cluster -Name {name}
Set-Cluster -Cluster $cluster {drs} {ha} -Confirm:$false | Out-Null"#
    )
}

pub fn add_host(cluster: &str, host: &HostConfig) -> String {
    let cluster = quote(cluster);
    let hostname = quote(&host.hostname);
    let username = quote(&host.username);
    let created = report("created");
    let existing = report("existing");

    format!(
        r#"$cluster = Get-Cluster -Name {cluster}
$vmhost = Get-VMHost -Name {hostname} -ErrorAction SilentlyContinue
if ($vmhost) {{
    if ($vmhost.Parent.Name -ne $cluster.Name) {{
        throw "Host {{0}} is already managed by vCenter in {{1}}" -f $vmhost.Name, $vmhost.Parent.Name
    }}
    $result = 'existing'
}} else {{
    $vmhost = Add-VMHost -Name {hostname} -Location $cluster -User {username} -Password $env:{HOST_PASSWORD_ENV} -Force -Confirm:$false
    $result = 'created'
}}
if ($vmhost.ConnectionState -eq 'Maintenance') {{
    Set-VMHost -VMHost $vmhost -State Connected -Confirm:$false | Out-Null
}}
if ($result -eq 'created') {{
    {created}
}} else {{
    {existing}
}}"#
    )
}

/// Creates the distributed switch, joins the host to it and attaches the uplinks.
///
/// Joining and attaching are checked separately from creation so a run interrupted half way
/// through completes them next time.
pub fn create_switch(datacenter: &str, hostname: &str, network: &NetworkConfig) -> String {
    let datacenter = quote(datacenter);
    let hostname = quote(hostname);
    let name = quote(&network.switch_name);
    let mtu = network.mtu;
    let uplink_count = network.uplinks.len();
    let uplinks = network
        .uplinks
        .iter()
        .map(|uplink| quote(uplink))
        .collect::<Vec<_>>()
        .join(", ");
    let version = network
        .switch_version
        .as_deref()
        .map(|version| format!(" -Version {}", quote(version)))
        .unwrap_or_default();
    let created = report("created");
    let existing = report("existing");

    format!(
        r#"$datacenter = Get-Datacenter -Name {datacenter}
$vmhost = Get-VMHost -Name {hostname}
$switch = Get-VDSwitch -Name {name} -Location $datacenter -ErrorAction SilentlyContinue
$result = 'existing'
if (-not $switch) {{
    $switch = New-VDSwitch -Name {name} -Location $datacenter -Mtu {mtu} -NumUplinkPorts {uplink_count}{version}
    $result = 'created'
}}
if (-not ($switch | Get-VMHost | Where-Object {{ $_.Name -eq $vmhost.Name }})) {{
    Add-VDSwitchVMHost -VDSwitch $switch -VMHost $vmhost -Confirm:$false | Out-Null
}}
$attached = @(Get-VMHostNetworkAdapter -VMHost $vmhost -DistributedSwitch $switch -Physical -ErrorAction SilentlyContinue | Select-Object -ExpandProperty Name)
foreach ($nic in @({uplinks})) {{
    if ($attached -notcontains $nic) {{
        $adapter = Get-VMHostNetworkAdapter -VMHost $vmhost -Physical -Name $nic
        Add-VDSwitchPhysicalNetworkAdapter -DistributedSwitch $switch -VMHostPhysicalNic $adapter -Confirm:$false | Out-Null
    }}
}}
if ($result -eq 'created') {{
    {created}
}} else {{
    {existing}
}}"#
    )
}

pub fn create_port_group(switch_name: &str, port_group: &PortGroup) -> String {
    let switch_name = quote(switch_name);
    let name = quote(&port_group.name);
    // An untagged port group is created without a VLAN
    let vlan = match port_group.vlan_id {
        0 => String::new(),
        vlan_id => format!(" -VlanId {vlan_id}"),
    };
    let created = report("created");
    let existing = report("existing");

    format!(
        r#"$switch = Get-VDSwitch -Name {switch_name}
if (Get-VDPortgroup -VDSwitch $switch -Name {name} -ErrorAction SilentlyContinue) {{
    {existing}
}} else {{
    New-VDPortgroup -VDSwitch $switch -Name {name}{vlan} | Out-Null
    {created}
}}"#
    )
}

pub fn create_datastore(hostname: &str, storage: &StorageConfig) -> String {
    let hostname = quote(hostname);
    let name = quote(&storage.datastore_name);
    let disk = quote(&storage.disk_canonical_name);
    let created = report("created");
    let existing = report("existing");

    format!(
        r#"$vmhost = Get-VMHost -Name {hostname}
if (Get-Datastore -Name {name} -ErrorAction SilentlyContinue) {{
    {existing}
}} else {{
    New-Datastore -VMHost $vmhost -Name {name} -Path {disk} -Vmfs | Out-Null
    {created}
}}"#
    )
}

/// Tags the datastore and creates a policy matching that tag, so the policy selects exactly the
/// datastores carrying it.
pub fn create_storage_policy(storage: &StorageConfig) -> String {
    let category = quote(&storage.tag_category);
    let tag = quote(storage.tag());
    let datastore = quote(&storage.datastore_name);
    let policy = quote(&storage.policy_name);
    let created = report("created");
    let existing = report("existing");

    format!(
        r#"$category = Get-TagCategory -Name {category} -ErrorAction SilentlyContinue
if (-not $category) {{
    $category = New-TagCategory -Name {category} -Cardinality Multiple -EntityType Datastore
}}
$tag = Get-Tag -Name {tag} -Category $category -ErrorAction SilentlyContinue
if (-not $tag) {{
    $tag = New-Tag -Name {tag} -Category $category
}}
$datastore = Get-Datastore -Name {datastore}
if (-not (Get-TagAssignment -Entity $datastore -Category $category | Where-Object {{ $_.Tag.Name -eq $tag.Name }})) {{
    New-TagAssignment -Tag $tag -Entity $datastore | Out-Null
}}
if (Get-SpbmStoragePolicy -Name {policy} -ErrorAction SilentlyContinue) {{
    {existing}
}} else {{
    $rule = New-SpbmRule -AnyOfTags $tag
    New-SpbmStoragePolicy -Name {policy} -AnyOfRuleSets (New-SpbmRuleSet -AllOfRules $rule) | Out-Null
    {created}
}}"#
    )
}
