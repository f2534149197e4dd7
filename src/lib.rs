//! # Proxycian
//!
//! Runtime dispatch-table compiler. Given a set of capability contracts and
//! an ordered list of method classifications, the engine compiles (and
//! caches) a dispatch specification, materializes instances satisfying every
//! contract, and routes each call on them to the classification that claims
//! the operation.
//!
//! ```no_run
//! use proxycian::{
//!     CapabilitySet, Contract, MethodMatcher, OperationDescriptor, PredicateClassification,
//!     ProxyEngine, Recipe, ValueType,
//! };
//! use serde_json::json;
//!
//! let greeter = Contract::interface("Greeter")
//!     .operation(
//!         OperationDescriptor::new("greet")
//!             .param(ValueType::String)
//!             .returns(ValueType::String),
//!     )
//!     .build();
//! let recipe = Recipe::builder("greeter", CapabilitySet::of(greeter)?)
//!     .classification(PredicateClassification::new(
//!         "greet",
//!         MethodMatcher::named("greet"),
//!         |inv| Ok(json!(format!("Hello, {}", inv.arg(0).as_str().unwrap_or_default()))),
//!     ))
//!     .build();
//!
//! let proxy = ProxyEngine::global().instantiate(&recipe, ())?;
//! assert_eq!(proxy.invoke("greet", &[json!("Ada")])?, json!("Hello, Ada"));
//! # Ok::<(), proxycian::ProxyError>(())
//! ```
//!
//! Modules:
//!
//! - [`contract`]: contracts, operation descriptors, capability sets
//! - [`classification`]: matchers, classifications, first-match resolution
//! - [`cache`]: concurrent memo tables
//! - [`dispatch`]: specifications, backends, proxies, dispatchers
//! - [`recipe`]: recipes, lifecycle hooks, transferable state
//! - [`engine`]: the public instantiation surface

pub mod cache;
pub mod classification;
pub mod config;
pub mod contract;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod recipe;

pub use classification::{
    Classification, ClassificationSet, CurriedClassification, Invocation, MethodMatcher,
    PredicateClassification,
};
pub use config::EngineConfig;
pub use contract::{CapabilitySet, Contract, ContractId, OperationDescriptor, ValueType};
pub use dispatch::{ConstructorArgs, DispatchHandler, DispatchSpec, Proxy};
pub use engine::ProxyEngine;
pub use error::{HandlerError, ProxyError, ProxyResult};
pub use recipe::{OnInstantiationCallback, ProxyToken, Recipe};
