use anyhow::{Context, Result};
use shopper_core::config::ShopperConfig;
use std::path::Path;

pub fn run(config_path: Option<&Path>, port: Option<u16>) -> Result<()> {
    let mut config = ShopperConfig::load(config_path).context("failed to load configuration")?;
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener =
            tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port)).await?;
        println!(
            "shopper backend → http://localhost:{}",
            listener.local_addr()?.port()
        );

        tokio::select! {
            res = shopper_server::serve_on(config, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
