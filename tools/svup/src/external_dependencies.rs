//! Checks that the tools svup drives are installed before anything in vCenter is touched.

use std::{fmt, process::Command};

use crate::svup_home::SvupHome;

const POWERCLI_MODULE: &str = "VCF.PowerCLI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// An executable on `PATH`
    Binary(&'static str),
    /// A module `pwsh` can import
    PowerShellModule(&'static str),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Binary(binary) => write!(f, "binary '{binary}'"),
            Requirement::PowerShellModule(module) => write!(f, "PowerShell module '{module}'"),
        }
    }
}

pub struct ExternalDependency {
    pub requirement: Requirement,
    pub install_advice: &'static str,
}

pub const PWSH: ExternalDependency = ExternalDependency {
    requirement: Requirement::Binary("pwsh"),
    install_advice: "Install PowerShell 7 following https://learn.microsoft.com/powershell/scripting/install/installing-powershell",
};

pub const POWERCLI: ExternalDependency = ExternalDependency {
    requirement: Requirement::PowerShellModule(POWERCLI_MODULE),
    install_advice: "Run `Install-Module VCF.PowerCLI -Scope CurrentUser` in pwsh",
};

pub const VCF: ExternalDependency = ExternalDependency {
    requirement: Requirement::Binary("vcf"),
    install_advice: "Download the VCF CLI from the Supervisor's landing page or the Broadcom support portal",
};

pub const KUBECTL: ExternalDependency = ExternalDependency {
    requirement: Requirement::Binary("kubectl"),
    install_advice: "Follow instructions on: https://kubernetes.io/docs/tasks/tools/",
};

/// PowerShell modules are only looked for once `pwsh` itself was found, so it comes first.
const DEPENDENCIES: [ExternalDependency; 4] = [PWSH, POWERCLI, VCF, KUBECTL];

/// Identifies a passed check, it is redone when svup or its dependency list changes.
fn fingerprint(dependencies: &[ExternalDependency]) -> String {
    let requirements = dependencies
        .iter()
        .map(|dependency| dependency.requirement.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!("svup {}: {requirements}", env!("CARGO_PKG_VERSION"))
}

fn module_check_command(module: &str) -> Command {
    let mut command = Command::new("pwsh");
    command
        .args(["-NoLogo", "-NoProfile", "-NonInteractive", "-Command"])
        // Get-Module prints nothing and succeeds when the module is missing
        .arg(format!(
            "if (-not (Get-Module -ListAvailable -Name '{module}')) {{ exit 1 }}"
        ));
    command
}

fn is_installed(requirement: Requirement) -> anyhow::Result<bool> {
    let output = match requirement {
        Requirement::Binary(binary) => Command::new("which").arg(binary).output()?,
        Requirement::PowerShellModule(module) => module_check_command(module).output()?,
    };

    Ok(output.status.success())
}

/// The dependencies `is_installed` rejects. Modules are not looked for without `pwsh`.
fn missing_dependencies<'a>(
    dependencies: &'a [ExternalDependency],
    mut is_installed: impl FnMut(Requirement) -> anyhow::Result<bool>,
) -> anyhow::Result<Vec<&'a ExternalDependency>> {
    let mut missing = Vec::new();
    let mut pwsh_found = true;

    for dependency in dependencies {
        let installed = match dependency.requirement {
            Requirement::PowerShellModule(_) if !pwsh_found => false,
            requirement => is_installed(requirement)?,
        };

        if dependency.requirement == PWSH.requirement {
            pwsh_found = installed;
        }
        if !installed {
            missing.push(dependency);
        }
    }

    Ok(missing)
}

pub fn preflight_check(svup_home: &SvupHome) -> anyhow::Result<()> {
    let fingerprint = fingerprint(&DEPENDENCIES);
    if svup_home.preflight_passed(&fingerprint) {
        tracing::debug!("Preflight check passed on an earlier run");
        return Ok(());
    }

    let missing = missing_dependencies(&DEPENDENCIES, is_installed)?;

    if !missing.is_empty() {
        for dependency in &missing {
            eprintln!(
                "{} not found. {}",
                dependency.requirement, dependency.install_advice
            );
        }
        anyhow::bail!("One or more missing dependencies found.")
    }

    svup_home.record_preflight_passed(&fingerprint)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_with(installed: &[Requirement]) -> Vec<Requirement> {
        missing_dependencies(&DEPENDENCIES, |requirement| {
            Ok(installed.contains(&requirement))
        })
        .unwrap()
        .into_iter()
        .map(|dependency| dependency.requirement)
        .collect()
    }

    #[test]
    fn pwsh_without_powercli_is_missing_the_module() {
        let missing = missing_with(&[
            PWSH.requirement,
            VCF.requirement,
            KUBECTL.requirement,
        ]);

        assert_eq!(missing, vec![Requirement::PowerShellModule("VCF.PowerCLI")]);
    }

    #[test]
    fn modules_are_not_looked_for_without_pwsh() {
        let mut looked_for = Vec::new();

        let missing = missing_dependencies(&DEPENDENCIES, |requirement| {
            looked_for.push(requirement);
            Ok(requirement != PWSH.requirement)
        })
        .unwrap();

        assert_eq!(missing.len(), 2);
        assert!(!looked_for.contains(&POWERCLI.requirement));
    }

    #[test]
    fn everything_installed() {
        let missing = missing_with(&DEPENDENCIES.map(|dependency| dependency.requirement));

        assert!(missing.is_empty());
    }

    #[test]
    fn module_check_fails_when_module_is_absent() {
        let command = module_check_command(POWERCLI_MODULE);

        assert_eq!(command.get_program(), "pwsh");
        let script = command.get_args().last().unwrap().to_str().unwrap();
        assert_eq!(
            script,
            "if (-not (Get-Module -ListAvailable -Name 'VCF.PowerCLI')) { exit 1 }"
        );
    }

    #[test]
    fn fingerprint_names_every_requirement() {
        let fingerprint = fingerprint(&DEPENDENCIES);

        assert!(fingerprint.starts_with(concat!("svup ", env!("CARGO_PKG_VERSION"))));
        assert!(fingerprint.ends_with(
            "binary 'pwsh', PowerShell module 'VCF.PowerCLI', binary 'vcf', binary 'kubectl'"
        ));
    }
}
