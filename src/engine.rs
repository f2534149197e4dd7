//! The proxy engine: process-scoped caches plus the public instantiation
//! surface.
//!
//! Every cache lives on a [`ProxyEngine`]. Independent engines share nothing;
//! [`ProxyEngine::global`] is a lazily created process-wide instance for
//! callers that do not want to thread an engine through their code.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;

use crate::cache::{
    CacheStats, ClassificationCache, ConstructorCache, SpecificationCache, SpecificationKey,
};
use crate::classification::ClassificationSet;
use crate::config::EngineConfig;
use crate::contract::{CapabilitySet, ContractId, ValueType};
use crate::dispatch::{
    introspect_base_constructor, CompiledSpec, ConstructorArgs, DispatchHandler, DispatchSpec,
    Dispatcher, ImplementationBackend, Proxy, ProxyState, VTableBackend, DEFAULT_BASE_ID,
};
use crate::error::{ProxyError, ProxyResult};
use crate::recipe::{
    DeserializationProxyFactory, NoopCallback, OnInstantiationCallback, ProxyToken, Recipe,
    RecipeDeserializationFactory, TransferableState,
};

static GLOBAL: Lazy<ProxyEngine> = Lazy::new(|| {
    ProxyEngine::new(EngineConfig::from_env(), Arc::new(VTableBackend::new()))
});

/// Snapshot of every cache's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Classification cache.
    pub classifications: CacheStats,
    /// Dispatch specification cache.
    pub specifications: CacheStats,
    /// Constructor cache (base and specification constructors).
    pub constructors: CacheStats,
}

/// Compiles capability sets, caches the results and instantiates proxies.
pub struct ProxyEngine {
    config: EngineConfig,
    backend: Arc<dyn ImplementationBackend>,
    classifications: Arc<ClassificationCache>,
    specifications: SpecificationCache,
    constructors: ConstructorCache,
    factories: RwLock<HashMap<String, Arc<dyn DeserializationProxyFactory>>>,
}

impl ProxyEngine {
    /// Create an engine with its own caches.
    pub fn new(config: EngineConfig, backend: Arc<dyn ImplementationBackend>) -> Self {
        log::debug!(
            "Creating proxy engine (backend: {}, prefix: {})",
            backend.name(),
            config.generated_name_prefix
        );
        Self {
            classifications: Arc::new(ClassificationCache::new(
                config.classification_cache_capacity,
                config.log_classification,
            )),
            specifications: SpecificationCache::new(config.specification_cache_capacity),
            constructors: ConstructorCache::new(config.constructor_cache_capacity),
            factories: RwLock::new(HashMap::new()),
            backend,
            config,
        }
    }

    /// Engine with default configuration and the v-table backend.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default(), Arc::new(VTableBackend::new()))
    }

    /// Process-wide engine, configured from `PROXYCIAN_*` environment
    /// variables on first use.
    pub fn global() -> &'static ProxyEngine {
        &GLOBAL
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Name of the implementation backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    // -----------------------------------------------------------------------
    // Specifications
    // -----------------------------------------------------------------------

    /// Compiled specification for `capabilities` and the given constructor
    /// argument shape. Repeated calls return the same `Arc` until the
    /// specification cache is cleared.
    pub fn get_dispatch_spec(
        &self,
        capabilities: &CapabilitySet,
        constructor_types: &[ValueType],
    ) -> ProxyResult<Arc<DispatchSpec>> {
        self.compiled(capabilities, constructor_types, Vec::new())
            .map(|compiled| compiled.spec().clone())
    }

    fn compiled(
        &self,
        capabilities: &CapabilitySet,
        constructor_types: &[ValueType],
        cache_identities: Vec<String>,
    ) -> ProxyResult<CompiledSpec> {
        let key = SpecificationKey::new(capabilities, constructor_types, cache_identities);
        self.specifications.get_or_compile(key, |key| {
            let base = capabilities.base();
            let owner = base
                .map(|b| b.id().clone())
                .unwrap_or_else(|| ContractId::new(DEFAULT_BASE_ID));
            let base_constructor =
                self.constructors
                    .get_or_introspect_base(owner, constructor_types, || {
                        introspect_base_constructor(base, constructor_types)
                    })?;
            let spec = Arc::new(DispatchSpec::compile(
                &self.config.generated_name_prefix,
                capabilities,
                base_constructor,
                key.cache_identities.clone(),
            ));
            let materializer = self.backend.materialize(spec.clone())?;
            Ok(CompiledSpec::new(spec, materializer))
        })
    }

    fn construct(
        &self,
        compiled: &CompiledSpec,
        dispatcher: Dispatcher,
        callback: Arc<dyn OnInstantiationCallback>,
        args: ConstructorArgs,
    ) -> ProxyResult<Proxy> {
        let spec = compiled.spec();
        let constructor = self
            .constructors
            .get_or_introspect_proxy(spec.id(), &args.types, || {
                compiled.materializer().constructor(&args.types)
            })?;
        constructor.construct(Arc::new(dispatcher), callback, args)
    }

    fn dispatcher(&self, state: ProxyState, classifications: &ClassificationSet) -> Dispatcher {
        Dispatcher::new(state, classifications.clone(), self.classifications.clone())
    }

    // -----------------------------------------------------------------------
    // Instantiation
    // -----------------------------------------------------------------------

    /// Instantiate `recipe` with `state`, using the zero-argument base
    /// constructor.
    pub fn instantiate<S: Any + Send + Sync>(&self, recipe: &Recipe, state: S) -> ProxyResult<Proxy> {
        self.instantiate_with_args(recipe, state, ConstructorArgs::none())
    }

    /// Instantiate `recipe` with `state`, forwarding `args` to the base
    /// behavior's matching constructor.
    pub fn instantiate_with_args<S: Any + Send + Sync>(
        &self,
        recipe: &Recipe,
        state: S,
        args: ConstructorArgs,
    ) -> ProxyResult<Proxy> {
        recipe.verify_proxy_state(&state, Some(&args))?;
        let compiled = self.compiled(
            recipe.capabilities(),
            &args.types,
            recipe.classifications().cache_identities(),
        )?;
        let dispatcher = self.dispatcher(Arc::new(state), recipe.classifications());
        self.construct(&compiled, dispatcher, recipe.callback(), args)
    }

    /// Instantiate a ready-made handler for `capabilities`.
    pub fn instantiate_handler(
        &self,
        handler: DispatchHandler,
        capabilities: &CapabilitySet,
    ) -> ProxyResult<Proxy> {
        self.instantiate_handler_with_args(handler, capabilities, ConstructorArgs::none())
    }

    /// Instantiate a ready-made handler, forwarding constructor arguments.
    pub fn instantiate_handler_with_args(
        &self,
        handler: DispatchHandler,
        capabilities: &CapabilitySet,
        args: ConstructorArgs,
    ) -> ProxyResult<Proxy> {
        args.check().map_err(ProxyError::InvalidProxyState)?;
        let compiled = self.compiled(
            capabilities,
            &args.types,
            handler.classifications().cache_identities(),
        )?;
        let dispatcher = handler.into_dispatcher(self.classifications.clone());
        self.construct(&compiled, dispatcher, Arc::new(NoopCallback), args)
    }

    /// Instantiate the transferable-state variant of `recipe`.
    pub fn instantiate_serializable<S: TransferableState>(
        &self,
        recipe: &Recipe,
        state: S,
    ) -> ProxyResult<Proxy> {
        self.instantiate_serializable_with_args(recipe, state, ConstructorArgs::none())
    }

    /// Instantiate the transferable-state variant of `recipe`, forwarding
    /// constructor arguments.
    pub fn instantiate_serializable_with_args<S: TransferableState>(
        &self,
        recipe: &Recipe,
        state: S,
        args: ConstructorArgs,
    ) -> ProxyResult<Proxy> {
        recipe.verify_proxy_state(&state, Some(&args))?;
        let variant = recipe.serializable_variant::<S>()?;
        let compiled = self.compiled(
            variant.capabilities(),
            &args.types,
            variant.classifications().cache_identities(),
        )?;
        let dispatcher = self.dispatcher(Arc::new(state), variant.classifications());
        self.construct(&compiled, dispatcher, recipe.callback(), args)
    }

    // -----------------------------------------------------------------------
    // Reconstruction
    // -----------------------------------------------------------------------

    /// Register the factory reconstructing tokens of its recipe. A later
    /// registration for the same recipe replaces the earlier one.
    pub fn register_factory(&self, factory: Arc<dyn DeserializationProxyFactory>) {
        let name = factory.recipe_name().to_string();
        log::debug!("Registering deserialization factory for recipe `{}`", name);
        if self.factories.write().insert(name.clone(), factory).is_some() {
            log::warn!("Replaced deserialization factory for recipe `{}`", name);
        }
    }

    /// Register a [`RecipeDeserializationFactory`] for `recipe` with state
    /// type `S`.
    pub fn register_recipe<S: TransferableState>(&self, recipe: &Recipe) {
        self.register_factory(Arc::new(RecipeDeserializationFactory::<S>::new(recipe.clone())));
    }

    /// Rebuild a live instance from a token.
    pub fn reconstruct(&self, token: &ProxyToken) -> ProxyResult<Proxy> {
        let factory = self
            .factories
            .read()
            .get(&token.recipe)
            .cloned()
            .ok_or_else(|| ProxyError::UnknownRecipe(token.recipe.clone()))?;
        factory.deserialize(self, token)
    }

    // -----------------------------------------------------------------------
    // Cache lifecycle
    // -----------------------------------------------------------------------

    /// Forget every memoized classification. Live instances keep working;
    /// their next calls re-resolve.
    pub fn clear_classification_cache(&self) -> usize {
        self.classifications.clear()
    }

    /// Forget every compiled specification and constructor. Live instances
    /// keep the specification they were built from.
    pub fn clear_specification_cache(&self) -> usize {
        self.specifications.clear() + self.constructors.clear()
    }

    /// Counters of every cache.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            classifications: self.classifications.stats(),
            specifications: self.specifications.stats(),
            constructors: self.constructors.stats(),
        }
    }
}

impl fmt::Debug for ProxyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEngine")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("stats", &self.stats())
            .field("factories", &self.factories.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
