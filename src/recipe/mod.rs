//! # Recipes
//!
//! A [`Recipe`] bundles a capability set, an ordered classification list and
//! optional lifecycle hooks into a reusable description that the
//! [`ProxyEngine`](crate::engine::ProxyEngine) instantiates. Recipes may
//! also produce a transferable-state variant whose instances externalize to
//! a [`ProxyToken`] and are rebuilt by a [`DeserializationProxyFactory`].

pub mod definition;
pub mod lifecycle;
pub mod serializable;

pub use definition::{Recipe, RecipeBuilder, SerializableVariant};
pub use lifecycle::{NoopCallback, OnInstantiationCallback, StateVerifierFn};
pub use serializable::{
    DeserializationProxyFactory, ProxyToken, RecipeDeserializationFactory, TransferableState,
};
