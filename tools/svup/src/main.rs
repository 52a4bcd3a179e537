use backend::VsphereBackend;
use clap::Parser;
use cli::Cli;
use common::tracing::init_tracing;
use external_dependencies::preflight_check;
use svup_home::SvupHome;

mod backend;
mod cli;
mod config;
mod error;
mod external_dependencies;
mod kubectl;
mod pipeline;
mod powercli;
mod stages;
mod subprocess;
mod svup_home;
mod vcenter;
mod vcf;
mod wait;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(not(unix))]
    panic!("Cannot run svup on non-unix platform");

    init_tracing("info");

    let cli = Cli::parse();
    tracing::debug!("Cli args: {:?}", cli);

    let config = config::load(&cli.infrastructure_json, &cli.supervisor_json)?;
    // Passwords are redacted
    tracing::debug!("Configuration: {:?}", config);

    if cli.validate_only {
        println!("Configuration is valid");
        for line in pipeline::describe(&config, cli.from) {
            println!("{line}");
        }
        return Ok(());
    }

    // Create a home directory for svup, used for the preflight check record and the kubeconfig
    // written when logging in to the Supervisor
    let svup_home = SvupHome::new()?;

    if !cli.skip_preflight_checks {
        preflight_check(&svup_home)?;
    }

    let kubeconfig = svup_home.kubeconfig_for_supervisor(&config.supervisor.name);
    let backend = VsphereBackend::connect(&config.infrastructure, kubeconfig).await?;

    let result = pipeline::run(&backend, &config, cli.from).await;

    backend.disconnect().await;

    result
}
