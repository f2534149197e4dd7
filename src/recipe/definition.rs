//! Recipes: reusable bundles of capabilities, classifications and
//! lifecycle hooks.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::lifecycle::{NoopCallback, OnInstantiationCallback, StateVerifierFn};
use super::serializable::{write_replace_classification, TransferableState};
use crate::cache::ComputeCache;
use crate::classification::{Classification, ClassificationSet};
use crate::contract::{system, CapabilitySet};
use crate::dispatch::ConstructorArgs;
use crate::error::{HandlerError, ProxyError, ProxyResult};

type StateTypeCheck = (fn(&(dyn Any + Send + Sync)) -> bool, &'static str);

fn is_state<S: Any>(state: &(dyn Any + Send + Sync)) -> bool {
    state.is::<S>()
}

/// Capabilities and classifications of a recipe's transferable-state
/// variant for one state type.
#[derive(Clone, Debug)]
pub struct SerializableVariant {
    capabilities: CapabilitySet,
    classifications: ClassificationSet,
}

impl SerializableVariant {
    /// Recipe capabilities plus the serializable marker.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Recipe classifications behind the leading `write_replace` one.
    pub fn classifications(&self) -> &ClassificationSet {
        &self.classifications
    }
}

struct RecipeInner {
    name: String,
    capabilities: CapabilitySet,
    classifications: ClassificationSet,
    callback: Arc<dyn OnInstantiationCallback>,
    verifier: Option<StateVerifierFn>,
    state_type: Option<StateTypeCheck>,
    variants: ComputeCache<TypeId, SerializableVariant>,
}

/// Immutable description of "which contracts, which classifications, which
/// hooks". Cheap to clone; many instances may be produced from one recipe.
#[derive(Clone)]
pub struct Recipe {
    inner: Arc<RecipeInner>,
}

impl Recipe {
    /// Start building a recipe named `name` for `capabilities`.
    pub fn builder(name: impl Into<String>, capabilities: CapabilitySet) -> RecipeBuilder {
        RecipeBuilder {
            name: name.into(),
            capabilities,
            classifications: Vec::new(),
            callback: None,
            verifier: None,
            state_type: None,
        }
    }

    /// Recipe name; tokens reference recipes by it.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Capability set instances will satisfy.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.inner.capabilities
    }

    /// Classification list, in evaluation order.
    pub fn classifications(&self) -> &ClassificationSet {
        &self.inner.classifications
    }

    /// Post-construction callback.
    pub fn callback(&self) -> Arc<dyn OnInstantiationCallback> {
        self.inner.callback.clone()
    }

    /// Fail fast when `state` cannot back an instance of this recipe.
    ///
    /// Checks the declared state type, the custom verifier, and, when
    /// constructor arguments are forwarded, that the capability set has a
    /// base behavior to receive them and that they match their types.
    pub fn verify_proxy_state(
        &self,
        state: &(dyn Any + Send + Sync),
        args: Option<&ConstructorArgs>,
    ) -> ProxyResult<()> {
        if let Some((check, expected)) = self.inner.state_type {
            if !check(state) {
                return Err(ProxyError::InvalidProxyState(format!(
                    "recipe `{}` expects state of type `{}`",
                    self.inner.name, expected
                )));
            }
        }
        if let Some(verify) = &self.inner.verifier {
            verify(state).map_err(|e| {
                ProxyError::InvalidProxyState(format!("recipe `{}`: {}", self.inner.name, e))
            })?;
        }
        if let Some(args) = args.filter(|args| !args.is_empty()) {
            if self.inner.capabilities.base().is_none() {
                return Err(ProxyError::InvalidProxyState(format!(
                    "recipe `{}` forwards constructor arguments but has no base behavior",
                    self.inner.name
                )));
            }
            args.check().map_err(ProxyError::InvalidProxyState)?;
        }
        Ok(())
    }

    /// The transferable-state variant for state type `S`. Built once per
    /// state type, so every instance of the variant shares one
    /// classification list and one compiled specification.
    pub fn serializable_variant<S: TransferableState>(&self) -> ProxyResult<SerializableVariant> {
        self.inner
            .variants
            .get_or_try_compute(TypeId::of::<S>(), |_| {
                let capabilities = self
                    .inner
                    .capabilities
                    .with(system::serializable_proxy())?;
                let classifications = self
                    .inner
                    .classifications
                    .with_leading([write_replace_classification::<S>(&self.inner.name)]);
                log::debug!(
                    "Derived serializable variant of `{}` for `{}`",
                    self.inner.name,
                    type_name::<S>()
                );
                Ok(SerializableVariant {
                    capabilities,
                    classifications,
                })
            })
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.inner.name)
            .field("capabilities", &self.inner.capabilities)
            .field("classifications", &self.inner.classifications)
            .field("state_type", &self.inner.state_type.map(|(_, name)| name))
            .finish_non_exhaustive()
    }
}

/// Builder for [`Recipe`].
pub struct RecipeBuilder {
    name: String,
    capabilities: CapabilitySet,
    classifications: Vec<Classification>,
    callback: Option<Arc<dyn OnInstantiationCallback>>,
    verifier: Option<StateVerifierFn>,
    state_type: Option<StateTypeCheck>,
}

impl RecipeBuilder {
    /// Append a classification; earlier ones take precedence.
    pub fn classification(mut self, classification: impl Into<Classification>) -> Self {
        self.classifications.push(classification.into());
        self
    }

    /// Append several classifications.
    pub fn classifications(mut self, classifications: impl IntoIterator<Item = Classification>) -> Self {
        self.classifications.extend(classifications);
        self
    }

    /// Run `callback` once per instance during construction.
    pub fn on_instantiation(mut self, callback: impl OnInstantiationCallback + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Custom state verifier.
    pub fn verifier<F>(mut self, verify: F) -> Self
    where
        F: Fn(&(dyn Any + Send + Sync)) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.verifier = Some(Arc::new(verify));
        self
    }

    /// Require proxy state of type `S`.
    pub fn state_type<S: Any>(mut self) -> Self {
        let check: fn(&(dyn Any + Send + Sync)) -> bool = is_state::<S>;
        self.state_type = Some((check, type_name::<S>()));
        self
    }

    /// Finish the recipe.
    pub fn build(self) -> Recipe {
        let classifications = ClassificationSet::new(self.classifications);
        if !classifications.has_catch_all() {
            log::debug!(
                "Recipe `{}` has no catch-all classification; unmatched operations without a default will fail",
                self.name
            );
        }
        Recipe {
            inner: Arc::new(RecipeInner {
                name: self.name,
                capabilities: self.capabilities,
                classifications,
                callback: self.callback.unwrap_or_else(|| Arc::new(NoopCallback)),
                verifier: self.verifier,
                state_type: self.state_type,
                variants: ComputeCache::with_capacity("serializable variant", 2),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{MethodMatcher, PredicateClassification};
    use crate::contract::system::SERIALIZABLE_PROXY_ID;
    use crate::contract::{Contract, ContractId, ValueType};
    use serde_json::{json, Value};

    fn greeter_set() -> CapabilitySet {
        CapabilitySet::of(Contract::interface("Greeter").build()).unwrap()
    }

    fn recipe() -> Recipe {
        Recipe::builder("greeter", greeter_set())
            .classification(PredicateClassification::new("all", MethodMatcher::Any, |_| {
                Ok(Value::Null)
            }))
            .state_type::<String>()
            .verifier(|state| match state.downcast_ref::<String>() {
                Some(s) if s.is_empty() => Err("state must not be empty".into()),
                _ => Ok(()),
            })
            .build()
    }

    #[test]
    fn test_verify_state_type() {
        let recipe = recipe();
        assert!(recipe.verify_proxy_state(&String::from("ok"), None).is_ok());
        let err = recipe.verify_proxy_state(&42_u32, None).unwrap_err();
        assert!(err.to_string().contains("String"));
    }

    #[test]
    fn test_verify_custom_verifier() {
        let err = recipe().verify_proxy_state(&String::new(), None).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidProxyState(msg) if msg.contains("must not be empty")));
    }

    #[test]
    fn test_constructor_args_need_base_behavior() {
        let args = ConstructorArgs::new(vec![ValueType::Integer], vec![json!(1)]);
        let err = recipe()
            .verify_proxy_state(&String::from("ok"), Some(&args))
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidProxyState(_)));
        assert!(recipe()
            .verify_proxy_state(&String::from("ok"), Some(&ConstructorArgs::none()))
            .is_ok());
    }

    #[test]
    fn test_serializable_variant_is_derived_once() {
        let recipe = recipe();
        let first = recipe.serializable_variant::<String>().unwrap();
        let second = recipe.serializable_variant::<String>().unwrap();
        assert_eq!(first.classifications().id(), second.classifications().id());
        assert!(first
            .capabilities()
            .contains(&ContractId::new(SERIALIZABLE_PROXY_ID)));
        assert_eq!(first.classifications().len(), recipe.classifications().len() + 1);
        assert_eq!(
            first.classifications().items()[0].description(),
            "greeter::write_replace"
        );
    }
}
