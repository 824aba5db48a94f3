use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vitals_client::VitalsClient;
use vitals_config::AppConfig;
use vitals_core::{ServiceKnownType, ServiceStatusHealth};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let filter = cli
        .log_level
        .map(|level| level.as_filter().to_owned())
        .unwrap_or_else(|| config.log.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            store_name,
        } => {
            let mut config = config;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(store_name) = store_name {
                config.store_name = store_name;
            }
            vitals_web::start_server(config).await?;
        }

        Commands::Report {
            service,
            worker,
            mode,
            status,
            details,
            url,
            api_key,
        } => {
            let client = client_for(&config, url, api_key)?;
            let health = ServiceStatusHealth {
                mode: mode.into(),
                status: status.into(),
                details,
                stacktrace: None,
            };
            let response = client.report_worker(&service, &worker, &health).await?;
            print_json(&response)?;
        }

        Commands::Get { service, url } => {
            let client = client_for(&config, url, None)?;
            print_json(&client.get_service(&service).await?)?;
        }

        Commands::List { url } => {
            let client = client_for(&config, url, None)?;
            print_json(&client.list_services().await?)?;
        }

        Commands::Types => {
            for kind in ServiceKnownType::ALL {
                println!("{kind}");
            }
        }
    }

    Ok(())
}

fn client_for(
    config: &AppConfig,
    url: Option<String>,
    api_key: Option<String>,
) -> Result<VitalsClient> {
    let url = url.unwrap_or_else(|| format!("http://127.0.0.1:{}", config.port));
    let key = api_key.or_else(|| config.api_key.clone());
    Ok(VitalsClient::new(url, key)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
