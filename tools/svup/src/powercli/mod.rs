//! Runs VMware PowerCLI through PowerShell for the inventory changes vCenter's REST API does not
//! cover: clusters, hosts, distributed switches, datastores and tag based storage policies.
//!
//! Every script connects with credentials taken from the environment, never from its text, and
//! reports whether it created its object or found it already present on a marker line.

mod scripts;

use base64::prelude::*;
use common::secret::Secret;
use tokio::process::Command;

use crate::backend::Outcome;
use crate::config::VcenterConfig;
use crate::subprocess::run_subprocess;

pub use scripts::{
    add_host, configure_cluster, create_cluster, create_datastore, create_port_group,
    create_storage_policy, create_switch, HOST_PASSWORD_ENV,
};

const PWSH: &str = "pwsh";

const SERVER_ENV: &str = "SVUP_VCENTER_SERVER";
const USERNAME_ENV: &str = "SVUP_VCENTER_USERNAME";
const PASSWORD_ENV: &str = "SVUP_VCENTER_PASSWORD";

pub const RESULT_MARKER: &str = "SVUP_RESULT=";

pub struct PowerCli {
    server: String,
    username: String,
    password: Secret<String>,
    insecure: bool,
}

impl PowerCli {
    pub fn new(vcenter: &VcenterConfig) -> Self {
        Self {
            server: vcenter.server.clone(),
            username: vcenter.username.clone(),
            password: vcenter.password.clone(),
            insecure: vcenter.insecure,
        }
    }

    /// Wraps `body` in a vCenter session which is closed however the body finishes.
    fn session_script(&self, body: &str) -> String {
        let certificate_action = if self.insecure { "Ignore" } else { "Fail" };

        format!(
            r#"$ErrorActionPreference = 'Stop'
$ProgressPreference = 'SilentlyContinue'
Set-PowerCLIConfiguration -Scope Session -InvalidCertificateAction {certificate_action} -ParticipateInCEIP $false -Confirm:$false | Out-Null
Connect-VIServer -Server $env:{SERVER_ENV} -User $env:{USERNAME_ENV} -Password $env:{PASSWORD_ENV} | Out-Null
try {{
{body}
}} finally {{
    Disconnect-VIServer -Server * -Force -Confirm:$false -ErrorAction SilentlyContinue
}}
"#
        )
    }

    /// Runs a script, returning its standard output.
    pub async fn run(
        &self,
        name: &'static str,
        body: &str,
        secrets: &[(&str, &Secret<String>)],
    ) -> anyhow::Result<String> {
        tracing::debug!("PowerCLI script for {name}:\n{body}");

        let mut command = Command::new(PWSH);
        command
            .args(["-NoLogo", "-NoProfile", "-NonInteractive", "-EncodedCommand"])
            .arg(encode_command(&self.session_script(body)))
            .env(SERVER_ENV, &self.server)
            .env(USERNAME_ENV, &self.username)
            .env(PASSWORD_ENV, self.password.expose());

        for (variable, value) in secrets {
            command.env(variable, value.expose());
        }

        run_subprocess(name, command, None, true).await
    }

    /// Runs a script which ensures an object exists and reports the [`Outcome`].
    pub async fn ensure(
        &self,
        name: &'static str,
        body: &str,
        secrets: &[(&str, &Secret<String>)],
    ) -> anyhow::Result<Outcome> {
        let output = self.run(name, body, secrets).await?;
        parse_outcome(name, &output)
    }
}

/// `-EncodedCommand` takes base64 of the UTF-16LE script, which spares us PowerShell's handling
/// of multi-line blocks read from stdin.
fn encode_command(script: &str) -> String {
    let utf16le: Vec<u8> = script
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();

    BASE64_STANDARD.encode(utf16le)
}

/// Finds the last result marker in a script's output.
pub fn parse_outcome(name: &str, output: &str) -> anyhow::Result<Outcome> {
    let Some(result) = output
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(RESULT_MARKER))
    else {
        anyhow::bail!("{name} finished without reporting whether it created anything");
    };

    match result {
        "created" => Ok(Outcome::Created),
        "existing" => Ok(Outcome::Existing),
        other => anyhow::bail!("{name} reported an unknown result '{other}'"),
    }
}

/// Quotes `value` as a PowerShell verbatim string so that no part of it is interpreted.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');

    for c in value.chars() {
        // PowerShell also treats typographic single quotes as string delimiters
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            quoted.push(c);
        }
        quoted.push(c);
    }

    quoted.push('\'');
    quoted
}
