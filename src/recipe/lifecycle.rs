//! Construction lifecycle hooks.

use std::any::Any;
use std::sync::Arc;

use crate::dispatch::Proxy;
use crate::error::HandlerError;

/// Called exactly once per instance, after base construction and before the
/// dispatcher is bound. Intercepted operations invoked from here fail with
/// [`ProxyError::NotYetBound`](crate::ProxyError::NotYetBound).
pub trait OnInstantiationCallback: Send + Sync {
    /// `proxy` is fully base-constructed; `state` is its bound state.
    fn proxy_created(
        &self,
        proxy: &Proxy,
        state: &(dyn Any + Send + Sync),
    ) -> Result<(), HandlerError>;
}

impl<F> OnInstantiationCallback for F
where
    F: Fn(&Proxy, &(dyn Any + Send + Sync)) -> Result<(), HandlerError> + Send + Sync,
{
    fn proxy_created(
        &self,
        proxy: &Proxy,
        state: &(dyn Any + Send + Sync),
    ) -> Result<(), HandlerError> {
        self(proxy, state)
    }
}

/// Callback that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl OnInstantiationCallback for NoopCallback {
    fn proxy_created(&self, _: &Proxy, _: &(dyn Any + Send + Sync)) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Custom proxy-state check run before any compilation work.
pub type StateVerifierFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), HandlerError> + Send + Sync>;
