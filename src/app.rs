//! Bootstrap: wires settings, the message bus, repositories and the LLM
//! client into a mediator, and owns their lifecycle.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bus::MessageBus;
use crate::config::Settings;
use crate::consumers;
use crate::llm::ChatCompletionClient;
use crate::mediator::{Context, Mediator};

pub struct App {
    settings: Arc<Settings>,
    bus: Arc<MessageBus>,
    mediator: Mediator,
}

impl App {
    /// Build the default wiring for `settings`.
    pub fn build(settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let bus = Arc::new(MessageBus::from_settings(&settings));

        let mut ctx = Context::new(Arc::clone(&settings), bus.publisher());
        if settings.llm_available() {
            match ChatCompletionClient::from_settings(&settings) {
                Ok(client) => {
                    info!(endpoint = ?client.endpoint(), "LLM suggestions enabled");
                    ctx = ctx.with_llm(Arc::new(client));
                }
                Err(e) => warn!(error = %e, "LLM client unavailable, suggestions will fall back"),
            }
        }

        Self::from_parts(settings, bus, ctx)
    }

    /// Assemble from explicit parts.
    pub fn from_parts(settings: Arc<Settings>, bus: Arc<MessageBus>, ctx: Context) -> Self {
        Self {
            settings,
            bus,
            mediator: Mediator::new(ctx),
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn mediator(&self) -> &Mediator {
        &self.mediator
    }

    /// Connect the bus and launch the inbound consumers.
    pub async fn start(&self) {
        info!(
            service = %self.settings.app_name,
            environment = %self.settings.environment,
            "starting"
        );
        self.bus.start(consumers::subscriptions(&self.settings)).await;
        info!("ready");
    }

    pub async fn stop(&self) {
        info!("shutting down");
        self.bus.stop().await;
    }

    #[cfg(feature = "http")]
    pub fn router(&self) -> axum::Router {
        crate::http::router(crate::http::AppState {
            mediator: self.mediator.clone(),
            settings: Arc::clone(&self.settings),
        })
    }

    /// Start, serve HTTP on `listener` until `shutdown` fires, then stop the
    /// bus after in-flight requests have drained.
    #[cfg(feature = "http")]
    pub async fn run(
        self,
        listener: tokio::net::TcpListener,
        shutdown: crate::shutdown::ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        self.start().await;
        let addr = listener.local_addr()?;
        info!(%addr, "listening");

        let result = crate::http::serve(listener, self.router(), async move {
            shutdown.recv().await
        })
        .await;

        self.stop().await;
        result
    }
}
