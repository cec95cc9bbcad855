//! Application state wiring the core pipeline to concrete infrastructure.
//!
//! The dispatcher is generic over its ports; `AppState` pins it to the
//! platform verifier, the Coze client, the WeCom client, and whichever cache
//! backend configuration selected.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use kfbridge_core::cache::ContextCache;
use kfbridge_core::cache::box_cache::BoxContextCache;
use kfbridge_core::context::store::ContextStore;
use kfbridge_core::dispatch::dispatcher::{Dispatcher, DispatcherSettings};
use kfbridge_infra::cache::open_cache;
use kfbridge_infra::coze::CozeWorkflowClient;
use kfbridge_infra::wecom::{CallbackVerifier, WeComClient};
use kfbridge_types::config::BridgeConfig;

/// Concrete type aliases for the core generics pinned to infra implementations.
pub type ConcreteContextStore = ContextStore<BoxContextCache, CozeWorkflowClient>;

pub type ConcreteDispatcher =
    Dispatcher<CallbackVerifier, BoxContextCache, CozeWorkflowClient, WeComClient>;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ConcreteDispatcher>,
    /// Bearer token for the admin routes. `None` leaves them unmounted.
    pub admin_token: Option<Arc<SecretString>>,
}

impl AppState {
    /// Validate configuration, open the cache, and wire the pipeline.
    pub async fn init(config: &BridgeConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let cache = open_cache(&config.cache).await?;
        Self::with_cache(config, cache)
    }

    /// Wire the pipeline around an already opened cache.
    pub fn with_cache(config: &BridgeConfig, cache: BoxContextCache) -> anyhow::Result<Self> {
        let verifier = Arc::new(CallbackVerifier::from_config(&config.wechat)?);
        let workflow = Arc::new(CozeWorkflowClient::from_config(&config.coze)?);
        let sender = Arc::new(WeComClient::from_config(&config.wechat)?);

        let contexts = context_store(config, cache, workflow.clone());
        let settings = DispatcherSettings::new(&config.messages, config.coze.stream);
        let dispatcher = Dispatcher::new(verifier, contexts, workflow, sender, settings);

        let admin_token = config
            .admin
            .token
            .as_ref()
            .map(|t| Arc::new(SecretString::from(t.expose_secret().to_string())));

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            admin_token,
        })
    }

    pub fn contexts(&self) -> &ConcreteContextStore {
        self.dispatcher.contexts()
    }

    /// Release the cache backend. Called once the server has drained.
    pub async fn close(&self) {
        if let Err(e) = self.contexts().cache().close().await {
            tracing::warn!(error = %e, "failed to close context cache");
        }
    }
}

fn context_store(
    config: &BridgeConfig,
    cache: BoxContextCache,
    workflow: Arc<CozeWorkflowClient>,
) -> ConcreteContextStore {
    ContextStore::new(
        Arc::new(cache),
        workflow,
        config.cache.prefix.clone(),
        Duration::from_secs(config.cache.context_ttl_secs),
    )
}

/// Open just the context store, for administrative commands that do not
/// need the callback credentials.
pub async fn open_context_store(config: &BridgeConfig) -> anyhow::Result<ConcreteContextStore> {
    let cache = open_cache(&config.cache).await?;
    let workflow = Arc::new(CozeWorkflowClient::from_config(&config.coze)?);
    Ok(context_store(config, cache, workflow))
}
