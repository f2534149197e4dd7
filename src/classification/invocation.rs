//! What a handler sees when its classification services a call.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::contract::{DefaultMethodFn, OperationDescriptor};
use crate::dispatch::Proxy;
use crate::error::HandlerError;

/// Handler servicing a classified operation.
pub type InvocationHandlerFn =
    Arc<dyn Fn(&Invocation<'_>) -> Result<Value, HandlerError> + Send + Sync>;

/// Classification-supplied context bound to a handler.
pub type HandlerContext = Arc<dyn Any + Send + Sync>;

/// One intercepted call: proxy, operation, arguments and any bound context.
pub struct Invocation<'a> {
    proxy: &'a Proxy,
    operation: &'a OperationDescriptor,
    args: &'a [Value],
    context: Option<&'a HandlerContext>,
    super_method: Option<&'a DefaultMethodFn>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        proxy: &'a Proxy,
        operation: &'a OperationDescriptor,
        args: &'a [Value],
        context: Option<&'a HandlerContext>,
        super_method: Option<&'a DefaultMethodFn>,
    ) -> Self {
        Self {
            proxy,
            operation,
            args,
            context,
            super_method,
        }
    }

    /// The proxy the call was made on.
    pub fn proxy(&self) -> &'a Proxy {
        self.proxy
    }

    /// The intercepted operation.
    pub fn operation(&self) -> &'a OperationDescriptor {
        self.operation
    }

    /// Call arguments.
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Argument at `index`, `Value::Null` when absent.
    pub fn arg(&self, index: usize) -> &'a Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }

    /// Bound proxy state downcast to `S`.
    pub fn state<S: Any>(&self) -> Option<&'a S> {
        self.proxy.proxy_state::<S>()
    }

    /// Bound proxy state, type-erased.
    pub fn state_any(&self) -> &'a (dyn Any + Send + Sync) {
        self.proxy.proxy_state_any()
    }

    /// Classification context downcast to `C`.
    pub fn context<C: Any>(&self) -> Option<&'a C> {
        self.context.and_then(|ctx| ctx.downcast_ref::<C>())
    }

    /// Whether the base behavior has a default implementation to delegate to.
    pub fn has_super(&self) -> bool {
        self.super_method.is_some()
    }

    /// Delegate to the base behavior's default implementation.
    pub fn invoke_super(&self) -> Result<Value, HandlerError> {
        match self.super_method {
            Some(default) => default(self.proxy, self.args),
            None => Err(format!(
                "`{}` has no default implementation to delegate to",
                self.operation.signature()
            )
            .into()),
        }
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("proxy", &self.proxy.spec_name())
            .field("operation", &self.operation.signature())
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
