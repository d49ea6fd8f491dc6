use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::Client;
use mysql_operator::config::OperatorConfig;
use mysql_operator::crd::{merged_crd, WebhookService};
use mysql_operator::logging::{init_logging, LogFormat};
use mysql_operator::{controller, webhook, Error};
use tracing::{info, info_span, Instrument};

#[derive(Parser, Debug)]
#[command(name = "mysql-operator", version, about = "Keeps MySQL workloads converged to their MySQL resources")]
struct Cli {
    /// Log level (trace|debug|info|warn|error); RUST_LOG overrides
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    /// Optional TOML config file
    #[arg(long, env = "MYSQL_OPERATOR_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller and the webhook server
    Run,
    /// Run only the admission and conversion webhook server
    Webhook,
    /// Print the merged CRD as YAML
    Crd {
        /// Namespace of the Service fronting the conversion webhook
        #[arg(long, requires = "service_name")]
        service_namespace: Option<String>,
        #[arg(long, requires = "service_namespace")]
        service_name: Option<String>,
        #[arg(long, default_value_t = 443)]
        service_port: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format)?;
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:#}");
            classify_exit_code(&e)
        }
    };
    info!(took_ms=%start.elapsed().as_millis(), exit_code, "operator.finished");
    if exit_code != 0 { process::exit(exit_code); }
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Crd { service_namespace, service_name, service_port } => {
            let service = service_namespace.zip(service_name).map(|(namespace, name)| WebhookService { namespace, name, port: service_port });
            let crd = merged_crd(service.as_ref())?;
            print!("{}", serde_yaml::to_string(&crd)?);
            Ok(())
        }
        Commands::Webhook => {
            let cfg = OperatorConfig::load(cli.config.as_deref())?;
            webhook::serve(&cfg).instrument(info_span!("cmd.webhook")).await
        }
        Commands::Run => {
            let cfg = OperatorConfig::load(cli.config.as_deref())?;
            let client = Client::try_default().await.context("connecting to the cluster")?;
            let span = info_span!("cmd.run", namespace=?cfg.namespace);
            async {
                tokio::select! {
                    res = controller::run(client, cfg.clone()) => res,
                    res = webhook::serve(&cfg) => res,
                }
            }
            .instrument(span)
            .await
        }
    }
}

/// 2 for configuration problems, 1 for everything else.
fn classify_exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<Error>() {
        Some(Error::Config(_)) => 2,
        _ => 1,
    }
}
