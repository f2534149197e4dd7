//! # Dispatch
//!
//! Compilation of capability sets into [`DispatchSpec`]s, the backend
//! contract that materializes them, and the runtime side: the live
//! [`Proxy`] and its per-instance [`Dispatcher`].
//!
//! ```text
//! CapabilitySet ──compile──▶ DispatchSpec ──backend──▶ Materializer
//!                                                          │ constructor(shape)
//!                                                          ▼
//!          Dispatcher ◀──bound── Proxy ◀──construct── ProxyConstructor
//! ```

pub mod backend;
pub mod dispatcher;
pub mod proxy;
pub mod spec;

pub use backend::{ImplementationBackend, Materializer, ProxyConstructor, Slot, VTable, VTableBackend};
pub use dispatcher::{DispatchHandler, Dispatcher, ProxyState};
pub use proxy::Proxy;
pub use spec::{introspect_base_constructor, CompiledSpec, ConstructorArgs, DispatchSpec, DEFAULT_BASE_ID};
