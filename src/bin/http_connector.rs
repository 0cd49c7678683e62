//! `http-connector`: the HTTP multiplexing gateway binary (spec §2, §6).

use clap::Parser;

use mist_connect::cli::Args;
use mist_connect::http::{HttpConfig, HttpServer};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mist_connect=info".parse()?)
                .add_directive("http_connector=info".parse()?),
        )
        .init();

    let config = HttpConfig::default()
        .bind(args.bind_addr(DEFAULT_PORT))
        .streamlist_path(args.streamlist.clone())
        .backend_root(args.backend_root.clone());

    let server = HttpServer::new(config);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP connector exited with an error");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
