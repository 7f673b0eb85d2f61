//! Entry point: initialize dependencies, serve both protocols until a
//! termination signal, then stop both servers and close the database.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use duplex_common::config::{DB_CONN_URL, GRPC_SERVER_PORT, HTTP_SERVER_PORT};
use duplex_common::{ConfigSource, Configuration};
use duplex_server::startup::{
    self, DependencyContext, LoggingConfig, initialize_with, wait_for_shutdown_signal,
};
use duplex_server::{GatewayServer, RpcServer, register_services};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "duplex-server", version, about = "Serve one contract over gRPC and JSON/HTTP")]
struct Cli {
    /// Dotenv file used to seed the environment
    #[arg(long, env = "DUPLEX_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Database connection URL, overrides DB_CONN_URL
    #[arg(long)]
    db_url: Option<String>,

    /// gRPC listen port, overrides GRPC_SERVER_PORT
    #[arg(long)]
    grpc_port: Option<u16>,

    /// HTTP gateway listen port, overrides HTTP_SERVER_PORT
    #[arg(long)]
    http_port: Option<u16>,
}

impl Cli {
    fn config_source(&self) -> ConfigSource {
        let mut source = ConfigSource::environment();
        if let Some(path) = &self.env_file {
            source = source.env_file(path);
        }
        if let Some(url) = &self.db_url {
            source = source.set(DB_CONN_URL, url.as_str());
        }
        if let Some(port) = self.grpc_port {
            source = source.set(GRPC_SERVER_PORT, port.to_string());
        }
        if let Some(port) = self.http_port {
            source = source.set(HTTP_SERVER_PORT, port.to_string());
        }
        source
    }
}

#[actix_web::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The logger is configured from the same source, so failures before it
    // exists go to stderr.
    let config = match Configuration::from_source(&cli.config_source()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("duplex-server: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let _logging_guard = match startup::init_logging(&LoggingConfig::from_settings(&config.logging))
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("duplex-server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let ctx = match initialize_with(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return ExitCode::FAILURE;
        }
    };

    let result = serve(&ctx).await;
    ctx.close_databases().await;

    match result {
        Ok(()) => {
            info!("Duplex server shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(ctx: &DependencyContext) -> anyhow::Result<()> {
    let options = register_services(ctx);
    let rpc = Arc::new(RpcServer::from_config(&ctx.config));
    let gateway = GatewayServer::from_config(&ctx.config);
    let shutdown = wait_for_shutdown_signal();

    let mut rpc_task = {
        let rpc = rpc.clone();
        let options = options.clone();
        tokio::spawn(async move { rpc.start(&options).await })
    };

    let gateway_run = gateway.start(&options);
    tokio::pin!(gateway_run);

    let mut gateway_result = None;
    let mut rpc_result = None;
    tokio::select! {
        result = &mut gateway_run => gateway_result = Some(result),
        result = &mut rpc_task => rpc_result = Some(result),
        _ = shutdown.wait() => {}
    }

    info!("Stopping servers");
    let gateway_result = match gateway_result {
        Some(result) => {
            gateway.stop().await;
            result
        }
        None => tokio::join!(&mut gateway_run, gateway.stop()).0,
    };
    rpc.stop().await;
    let rpc_result = match rpc_result {
        Some(result) => result,
        None => (&mut rpc_task).await,
    };

    gateway_result.context("HTTP gateway failed")?;
    rpc_result
        .context("gRPC server task aborted")?
        .context("gRPC server failed")?;
    Ok(())
}
