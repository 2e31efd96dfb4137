use domplay_core::PlaygroundConfig;
use domplay_server::ServerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "domplay_server=info,domplay_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ServerConfig::default();
    if let Ok(port) = std::env::var("DOMPLAY_PORT") {
        config.port = port.parse()?;
    }
    if let Ok(path) = std::env::var("DOMPLAY_CONFIG") {
        config.playground = PlaygroundConfig::load(path)?;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(domplay_server::serve(config))?;

    Ok(())
}
