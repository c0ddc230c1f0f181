use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use tradedash_market_feed::{HttpProviderClient, MarketFeed, ProviderClient};

use crate::config::Config;

pub struct AppState {
    pub feed: MarketFeed,
}

pub fn init_tracing() {
    let log_format = std::env::var("TD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let providers: Vec<Arc<dyn ProviderClient>> = config
        .upstreams
        .iter()
        .map(|upstream| {
            tracing::info!(
                "Upstream '{}' at {} serving {:?}",
                upstream.id,
                upstream.base_url,
                upstream.kinds
            );
            let mut client =
                HttpProviderClient::new(upstream.id, upstream.base_url.clone(), upstream.kinds);
            if let Some(key) = &upstream.api_key {
                client = client.with_api_key(key.clone());
            }
            Arc::new(client) as Arc<dyn ProviderClient>
        })
        .collect();

    if providers.is_empty() {
        tracing::warn!("No upstreams configured, every widget will be served from fallback data");
    }

    let feed = MarketFeed::new(config.feed.clone(), providers)?;
    Ok(Arc::new(AppState { feed }))
}
