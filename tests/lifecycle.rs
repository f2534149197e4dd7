//! Construction lifecycle: argument forwarding, callback ordering, state
//! verification and base-behavior defaults.

mod common;

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use proxycian::{
    CapabilitySet, ConstructorArgs, DispatchHandler, HandlerError, MethodMatcher,
    PredicateClassification, Proxy, ProxyEngine, ProxyError, Recipe, ValueType,
};
use serde_json::json;

use common::*;

fn counter_recipe() -> Recipe {
    let set = CapabilitySet::new([counter_base(), greeter()]).unwrap();
    Recipe::builder("counter", set)
        .classification(PredicateClassification::new(
            "next",
            MethodMatcher::named("next"),
            |inv| {
                let counter = inv.state::<Mutex<i64>>().ok_or("counter state missing")?;
                let mut value = counter.lock();
                *value += 1;
                Ok(json!(*value))
            },
        ))
        .classification(greet_classification())
        .state_type::<Mutex<i64>>()
        .build()
}

fn start_at(n: i64) -> ConstructorArgs {
    ConstructorArgs::new(vec![ValueType::Integer], vec![json!(n)])
}

// ============================================================================
// Constructor forwarding
// ============================================================================

#[test]
fn test_constructor_arguments_reach_base_behavior() {
    let engine = ProxyEngine::with_defaults();
    let proxy = engine
        .instantiate_with_args(&counter_recipe(), Mutex::new(0_i64), start_at(10))
        .unwrap();

    assert_eq!(proxy.base_fields(), &json!({ "start": 10 }));
    assert_eq!(proxy.constructor_args(), &start_at(10));
    assert_eq!(proxy.invoke("next", &[]).unwrap(), json!(1));
    assert_eq!(proxy.invoke("next", &[]).unwrap(), json!(2));
    assert_eq!(proxy.invoke("greet", &[json!("Ada")]).unwrap(), json!("Hello, Ada"));
}

#[test]
fn test_state_is_not_shared_between_instances() {
    let engine = ProxyEngine::with_defaults();
    let recipe = counter_recipe();
    let a = engine
        .instantiate_with_args(&recipe, Mutex::new(0_i64), start_at(1))
        .unwrap();
    let b = engine
        .instantiate_with_args(&recipe, Mutex::new(100_i64), start_at(1))
        .unwrap();
    a.invoke("next", &[]).unwrap();
    assert_eq!(b.invoke("next", &[]).unwrap(), json!(101));
    assert!(Arc::ptr_eq(a.spec(), b.spec()));
}

#[test]
fn test_missing_constructor_is_a_contract_violation() {
    let engine = ProxyEngine::with_defaults();
    let args = ConstructorArgs::new(vec![ValueType::String], vec![json!("ten")]);
    match engine
        .instantiate_with_args(&counter_recipe(), Mutex::new(0_i64), args)
        .unwrap_err()
    {
        ProxyError::ConstructionContractViolation { owner, signature } => {
            assert_eq!(owner, "app.AbstractCounter");
            assert_eq!(signature, "string");
        }
        other => panic!("expected ConstructionContractViolation, got {other}"),
    }
    assert_eq!(engine.stats().specifications.entries, 0);
}

#[test]
fn test_base_constructor_failure_is_reported() {
    let engine = ProxyEngine::with_defaults();
    let base = proxycian::Contract::base_behavior("app.Fragile")
        .constructor([], |_| Err("refusing to construct".into()))
        .build();
    let recipe = Recipe::builder("fragile", CapabilitySet::of(base).unwrap()).build();
    let err = engine.instantiate(&recipe, ()).unwrap_err();
    assert!(matches!(err, ProxyError::Handler { .. }));
    assert!(err.to_string().contains("app.Fragile"));
}

// ============================================================================
// Post-construction callback
// ============================================================================

#[test]
fn test_callback_sees_constructed_instance_before_binding() {
    let engine = ProxyEngine::with_defaults();
    let observed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let log = observed.clone();
    let set = CapabilitySet::new([counter_base(), greeter()]).unwrap();
    let recipe = Recipe::builder("observed", set)
        .classification(fallback_classification())
        .on_instantiation(
            move |proxy: &Proxy, state: &(dyn Any + Send + Sync)| -> Result<(), HandlerError> {
                let mut log = log.lock();
                log.push(format!("fields={}", proxy.base_fields()));
                log.push(format!("state={:?}", state.downcast_ref::<&str>()));
                log.push(format!("bound={}", proxy.is_bound()));
                match proxy.invoke("greet", &[json!("early")]) {
                    Err(ProxyError::NotYetBound { .. }) => log.push("not yet bound".into()),
                    other => log.push(format!("unexpected: {other:?}")),
                }
                Ok(())
            },
        )
        .build();

    let proxy = engine.instantiate_with_args(&recipe, "s", start_at(3)).unwrap();
    assert!(proxy.is_bound());
    assert_eq!(
        *observed.lock(),
        vec![
            "fields={\"start\":3}".to_string(),
            "state=Some(\"s\")".to_string(),
            "bound=false".to_string(),
            "not yet bound".to_string(),
        ]
    );
    assert_eq!(proxy.invoke("greet", &[json!("late")]).unwrap(), json!("default"));
}

#[test]
fn test_callback_runs_once_per_instance() {
    let engine = ProxyEngine::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let recipe = Recipe::builder("counted", greeter_set())
        .on_instantiation(
            move |_: &Proxy, _: &(dyn Any + Send + Sync)| -> Result<(), HandlerError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .build();
    for _ in 0..3 {
        engine.instantiate(&recipe, ()).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_callback_failure_aborts_instantiation() {
    let engine = ProxyEngine::with_defaults();
    let recipe = Recipe::builder("vetoed", greeter_set())
        .on_instantiation(
            |_: &Proxy, _: &(dyn Any + Send + Sync)| -> Result<(), HandlerError> {
                Err("vetoed".into())
            },
        )
        .build();
    let err = engine.instantiate(&recipe, ()).unwrap_err();
    assert!(matches!(err, ProxyError::Handler { .. }));
}

// ============================================================================
// State verification
// ============================================================================

#[test]
fn test_invalid_state_fails_before_compilation() {
    let engine = ProxyEngine::with_defaults();
    let err = engine
        .instantiate_with_args(&counter_recipe(), "not a counter", start_at(0))
        .unwrap_err();
    assert!(matches!(err, ProxyError::InvalidProxyState(_)));
    let stats = engine.stats();
    assert_eq!(stats.specifications.misses, 0);
    assert_eq!(stats.constructors.misses, 0);
}

#[test]
fn test_custom_verifier_rejects_state() {
    let engine = ProxyEngine::with_defaults();
    let recipe = Recipe::builder("positive", greeter_set())
        .verifier(|state| match state.downcast_ref::<i32>() {
            Some(n) if *n > 0 => Ok(()),
            _ => Err("expected a positive i32".into()),
        })
        .build();
    assert!(engine.instantiate(&recipe, 5_i32).is_ok());
    let err = engine.instantiate(&recipe, -5_i32).unwrap_err();
    assert!(err.to_string().contains("expected a positive i32"));
}

#[test]
fn test_constructor_args_without_base_behavior_are_rejected() {
    let engine = ProxyEngine::with_defaults();
    let err = engine
        .instantiate_with_args(&greeter_recipe(), (), start_at(1))
        .unwrap_err();
    assert!(matches!(err, ProxyError::InvalidProxyState(_)));
}

#[test]
fn test_mistyped_constructor_values_are_rejected() {
    let engine = ProxyEngine::with_defaults();
    let args = ConstructorArgs::new(vec![ValueType::Integer], vec![json!("three")]);
    let err = engine
        .instantiate_with_args(&counter_recipe(), Mutex::new(0_i64), args)
        .unwrap_err();
    assert!(matches!(err, ProxyError::InvalidProxyState(_)));
}

// ============================================================================
// Base-behavior defaults
// ============================================================================

#[test]
fn test_unclassified_operation_falls_back_to_base_default() {
    let engine = ProxyEngine::with_defaults();
    let proxy = engine
        .instantiate_with_args(&counter_recipe(), Mutex::new(0_i64), start_at(7))
        .unwrap();
    assert_eq!(proxy.invoke("describe", &[]).unwrap(), json!("counter from 7"));
    assert!(matches!(
        proxy.invoke("farewell", &[]).unwrap_err(),
        ProxyError::UnclassifiedOperation { .. }
    ));
}

#[test]
fn test_handler_can_invoke_super() {
    let engine = ProxyEngine::with_defaults();
    let set = CapabilitySet::new([counter_base(), greeter()]).unwrap();
    let recipe = Recipe::builder("decorated", set)
        .classification(PredicateClassification::new(
            "decorate",
            MethodMatcher::Any,
            |inv| {
                if !inv.has_super() {
                    return Ok(json!(format!("<{}>", inv.operation().name())));
                }
                let inner = inv.invoke_super()?;
                Ok(json!(format!("[{}]", inner.as_str().unwrap_or_default())))
            },
        ))
        .build();
    let proxy = engine.instantiate_with_args(&recipe, (), start_at(2)).unwrap();
    assert_eq!(proxy.invoke("describe", &[]).unwrap(), json!("[counter from 2]"));
    assert_eq!(proxy.invoke("farewell", &[]).unwrap(), json!("<farewell>"));
}

// ============================================================================
// Classification context
// ============================================================================

#[test]
fn test_method_context_is_computed_once_per_operation() {
    let engine = ProxyEngine::with_defaults();
    let computed = Arc::new(AtomicUsize::new(0));
    let counter = computed.clone();
    let recipe = Recipe::builder("shouting", greeter_set())
        .classification(
            PredicateClassification::new("shout", MethodMatcher::Any, |inv| {
                Ok(json!(inv.context::<String>().cloned().unwrap_or_default()))
            })
            .with_method_context(move |op| {
                counter.fetch_add(1, Ordering::SeqCst);
                op.name().to_uppercase()
            }),
        )
        .build();
    let proxy = engine.instantiate(&recipe, ()).unwrap();
    for _ in 0..3 {
        assert_eq!(proxy.invoke("farewell", &[]).unwrap(), json!("FAREWELL"));
    }
    assert_eq!(computed.load(Ordering::SeqCst), 1);

    engine.clear_classification_cache();
    proxy.invoke("farewell", &[]).unwrap();
    assert_eq!(computed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_curried_classification_passes_bound_context() {
    let engine = ProxyEngine::with_defaults();
    let classifications = proxycian::ClassificationSet::new([
        proxycian::CurriedClassification::new(
            "prefixed",
            MethodMatcher::named("greet"),
            String::from("Howdy"),
            |inv| {
                let prefix = inv.context::<String>().ok_or("missing prefix")?;
                Ok(json!(format!("{}, {}", prefix, inv.arg(0).as_str().unwrap_or("?"))))
            },
        )
        .into(),
        fallback_classification().into(),
    ]);
    let proxy = engine
        .instantiate_handler(DispatchHandler::new((), classifications), &greeter_set())
        .unwrap();
    assert_eq!(proxy.invoke("greet", &[json!("Ada")]).unwrap(), json!("Howdy, Ada"));
    assert_eq!(proxy.invoke("farewell", &[]).unwrap(), json!("default"));
}
