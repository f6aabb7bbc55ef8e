//! Typed request dispatch.
//!
//! Every request kind implements [`Request`], naming its response type, and
//! the [`Mediator`] implements [`Handler`] for each kind it serves. Sending a
//! request the mediator has no handler for is a compile error.
//!
//! ```ignore
//! let mediator = Mediator::new(Context::new(settings, bus.publisher()));
//! let saved = mediator
//!     .send(CreatePrescription { prescription, correlation_id: None })
//!     .await?;
//! ```

mod context;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ServiceError;

pub use context::Context;

/// A command or query the mediator can dispatch.
pub trait Request: Send + 'static {
    type Response: Send + 'static;

    /// Name used in logs.
    const NAME: &'static str;

    /// Input checks run before the handler is invoked.
    fn validate(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, request: R) -> Result<R::Response, ServiceError>;
}

/// Routes requests to their handlers over a shared [`Context`].
#[derive(Clone)]
pub struct Mediator {
    ctx: Context,
}

impl Mediator {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, ServiceError>
    where
        R: Request,
        Self: Handler<R>,
    {
        request.validate()?;
        info!(request = R::NAME, "mediator dispatching");

        let result = Handler::<R>::handle(self, request).await;
        if let Err(e) = &result {
            warn!(request = R::NAME, status = e.status_code(), error = %e, "request failed");
        }
        result
    }
}
