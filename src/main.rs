//! ekcfg - EKS kubeconfig generator.
//!
//! Renders kubeconfig files for EKS clusters, serves as a CloudFormation
//! custom resource handler, and resolves EKS cluster blueprints.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use ekcfg::blueprint::{BlueprintSpec, ClusterBlueprint};
use ekcfg::config::{Args, Command, OutputFormat, VERSION};
use ekcfg::eks::{ClusterDescriber, EksClient};
use ekcfg::error::EkcfgError;
use ekcfg::handler::{self, CustomResourceEvent, HandlerOptions};
use ekcfg::kubeconfig::{self, ClusterDescriptor};
use ekcfg::logging;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(&args.log_format, &args.log_level);

    info!("Starting ekcfg v{}", VERSION);

    if let Err(e) = run(args).await {
        error!(error = %e, "ekcfg failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let client = if args.command.needs_aws() {
        Some(EksClient::new(args.profile.as_deref(), args.region.as_deref()).await?)
    } else {
        None
    };

    match args.command {
        Command::Render {
            name,
            endpoint,
            ca_data,
            arn,
        } => {
            let mut descriptor = ClusterDescriptor::new(name, endpoint, ca_data);
            descriptor.arn = arn;
            print!("{}", kubeconfig::synthesize(&descriptor)?);
            Ok(())
        }
        Command::Generate { cluster, output } => {
            let client = require_client(client)?;
            let descriptor = client
                .describe_cluster(&cluster)
                .await?
                .ok_or_else(|| EkcfgError::ClusterNotFound(cluster.clone()))?;
            let document = kubeconfig::synthesize(&descriptor)?;

            match output {
                Some(path) => handler::persist(&document, &path),
                None => {
                    print!("{document}");
                    Ok(())
                }
            }
        }
        Command::Handle {
            event,
            output,
            lambda_function,
        } => {
            let client = require_client(client)?;
            let event = CustomResourceEvent::from_json(&read_event(&event)?)?;
            let options = HandlerOptions::resolve(output, lambda_function.as_deref());
            let response = handler::handle_event(&client, &event, &options).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Blueprint { file, format } => {
            let spec = BlueprintSpec::from_file(&file)?;
            let blueprint = ClusterBlueprint::resolve(&spec)?;
            info!(cluster = %blueprint.cluster.name, "Blueprint resolved");

            match format {
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&blueprint)?),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&blueprint)?),
            }
            Ok(())
        }
    }
}

fn require_client(client: Option<EksClient>) -> Result<EksClient> {
    client.ok_or_else(|| anyhow::anyhow!("EKS client was not initialized"))
}

fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read event from stdin")?;
        return Ok(buf);
    }

    std::fs::read_to_string(Path::new(source))
        .with_context(|| format!("Failed to read event file {source}"))
}
