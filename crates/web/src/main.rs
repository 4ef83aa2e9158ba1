use tracing::info;

use imgreg_web::server::WebServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = WebServerConfig::from_env()?;

    info!(
        "Starting imgreg-web {} on http://{}",
        imgreg_common::VERSION,
        cfg.addr
    );

    imgreg_web::server::serve(cfg).await
}
