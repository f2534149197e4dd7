//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use proxycian::{
    CapabilitySet, Contract, HandlerError, Invocation, MethodMatcher, OperationDescriptor,
    PredicateClassification, Recipe, ValueType,
};
use serde_json::{json, Value};

/// `Greeter { greet(string) -> string; farewell() -> string }`
pub fn greeter() -> Arc<Contract> {
    Contract::interface("app.Greeter")
        .operation(
            OperationDescriptor::new("greet")
                .param(ValueType::String)
                .returns(ValueType::String),
        )
        .operation(OperationDescriptor::new("farewell").returns(ValueType::String))
        .build()
}

/// Base behavior with an integer constructor, a default `describe()` and an
/// abstract `next()`.
pub fn counter_base() -> Arc<Contract> {
    Contract::base_behavior("app.AbstractCounter")
        .constructor([ValueType::Integer], |args| Ok(json!({ "start": args[0] })))
        .default_method(
            OperationDescriptor::new("describe").returns(ValueType::String),
            |proxy, _| Ok(json!(format!("counter from {}", proxy.base_fields()["start"]))),
        )
        .operation(OperationDescriptor::new("next").returns(ValueType::Integer))
        .build()
}

pub fn greeter_set() -> CapabilitySet {
    CapabilitySet::of(greeter()).expect("valid capability set")
}

pub fn hello(inv: &Invocation<'_>) -> Result<Value, HandlerError> {
    let name = inv.arg(0).as_str().ok_or("greet expects a string")?;
    Ok(json!(format!("Hello, {}", name)))
}

pub fn greet_classification() -> PredicateClassification {
    PredicateClassification::new("greet", MethodMatcher::named("greet"), hello)
}

pub fn fallback_classification() -> PredicateClassification {
    PredicateClassification::new("fallback", MethodMatcher::Any, |_| Ok(json!("default")))
}

/// Greeter recipe with a greet classification and a catch-all fallback.
pub fn greeter_recipe() -> Recipe {
    Recipe::builder("greeter", greeter_set())
        .classification(greet_classification())
        .classification(fallback_classification())
        .build()
}
