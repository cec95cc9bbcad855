//! `kfbridge check`: validate configuration and reach the context cache.

use anyhow::Result;
use console::style;

use kfbridge_core::cache::ContextCache;
use kfbridge_infra::cache::open_cache;
use kfbridge_types::config::BridgeConfig;

pub async fn check(config: &BridgeConfig, json: bool) -> Result<()> {
    let config_result = config.validate();

    let cache_result = match open_cache(&config.cache).await {
        Ok(cache) => {
            let ping = cache.ping().await;
            let _ = cache.close().await;
            ping
        }
        Err(e) => Err(e),
    };

    let healthy = config_result.is_ok() && cache_result.is_ok();

    if json {
        let report = serde_json::json!({
            "config": config_result.as_ref().err().map(ToString::to_string).unwrap_or_else(|| "ok".to_string()),
            "cache_backend": format!("{:?}", config.cache.backend).to_lowercase(),
            "cache": cache_result.as_ref().err().map(ToString::to_string).unwrap_or_else(|| "ok".to_string()),
            "healthy": healthy,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mark = |ok: bool| {
            if ok {
                format!("{}", style("✓").green())
            } else {
                format!("{}", style("✗").red())
            }
        };
        println!();
        println!("  {} kfbridge v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
        println!();
        match &config_result {
            Ok(()) => println!("  {} Configuration valid", mark(true)),
            Err(e) => println!("  {} Configuration: {e}", mark(false)),
        }
        match &cache_result {
            Ok(()) => println!("  {} Context cache ({:?}) reachable", mark(true), config.cache.backend),
            Err(e) => println!("  {} Context cache: {e}", mark(false)),
        }
        println!();
    }

    if !healthy {
        anyhow::bail!("check failed");
    }
    Ok(())
}
