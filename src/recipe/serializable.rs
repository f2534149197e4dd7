//! Transferable-state proxies.
//!
//! A serializable variant of a recipe adds the
//! [`SERIALIZABLE_PROXY_ID`](crate::contract::system::SERIALIZABLE_PROXY_ID)
//! marker contract and a leading classification that answers
//! `write_replace()` with a [`ProxyToken`]. A token names the recipe and
//! carries the serialized state; the factory registered for that recipe
//! turns it back into a live instance through the normal instantiation path.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::definition::Recipe;
use crate::classification::{Classification, CurriedClassification, Invocation, MethodMatcher};
use crate::contract::system::{SERIALIZABLE_PROXY_ID, WRITE_REPLACE};
use crate::contract::ContractId;
use crate::dispatch::{ConstructorArgs, Proxy};
use crate::engine::ProxyEngine;
use crate::error::{HandlerError, ProxyError, ProxyResult};

/// State that can travel inside a [`ProxyToken`].
pub trait TransferableState: Serialize + DeserializeOwned + Any + Send + Sync {}

impl<T> TransferableState for T where T: Serialize + DeserializeOwned + Any + Send + Sync {}

/// Compact stand-in for an externalized instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyToken {
    /// Name of the recipe whose factory reconstructs the instance.
    pub recipe: String,
    /// User contracts of the original instance.
    pub contracts: Vec<ContractId>,
    /// Serialized proxy state.
    pub state: Value,
    /// Constructor arguments of the original instance.
    #[serde(default, skip_serializing_if = "ConstructorArgs::is_empty")]
    pub constructor: ConstructorArgs,
}

impl ProxyToken {
    /// Render as JSON.
    pub fn to_json(&self) -> ProxyResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> ProxyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Context curried into the `write_replace` classification.
struct WriteReplaceContext {
    recipe: String,
    serialize: fn(&(dyn Any + Send + Sync)) -> Result<Value, HandlerError>,
}

fn serialize_state<S: TransferableState>(
    state: &(dyn Any + Send + Sync),
) -> Result<Value, HandlerError> {
    let state = state
        .downcast_ref::<S>()
        .ok_or_else(|| format!("proxy state is not a `{}`", type_name::<S>()))?;
    Ok(serde_json::to_value(state)?)
}

fn write_replace(inv: &Invocation<'_>) -> Result<Value, HandlerError> {
    let ctx = inv
        .context::<WriteReplaceContext>()
        .ok_or("write_replace invoked without its recipe context")?;
    let token = ProxyToken {
        recipe: ctx.recipe.clone(),
        contracts: inv.proxy().contracts(),
        state: (ctx.serialize)(inv.state_any())?,
        constructor: inv.proxy().constructor_args().clone(),
    };
    Ok(serde_json::to_value(token)?)
}

/// Leading classification answering `write_replace()` with a token for
/// `recipe`.
pub(crate) fn write_replace_classification<S: TransferableState>(recipe: &str) -> Classification {
    CurriedClassification::new(
        format!("{recipe}::write_replace"),
        MethodMatcher::predicate(|op| {
            op.name() == WRITE_REPLACE
                && op.arity() == 0
                && op.declaring_contract().as_str() == SERIALIZABLE_PROXY_ID
        }),
        WriteReplaceContext {
            recipe: recipe.to_string(),
            serialize: serialize_state::<S>,
        },
        write_replace,
    )
    .into()
}

/// Rebuilds live instances from tokens of one recipe.
pub trait DeserializationProxyFactory: Send + Sync {
    /// Recipe whose tokens this factory accepts.
    fn recipe_name(&self) -> &str;

    /// Contracts dropped from a token before comparing it with the recipe.
    fn excluded_contracts(&self) -> Vec<ContractId> {
        vec![ContractId::new(SERIALIZABLE_PROXY_ID)]
    }

    /// Reconstruct an instance from `token` through `engine`.
    fn deserialize(&self, engine: &ProxyEngine, token: &ProxyToken) -> ProxyResult<Proxy>;
}

/// Factory bound to a [`Recipe`] whose state type is `S`.
pub struct RecipeDeserializationFactory<S> {
    recipe: Recipe,
    _state: PhantomData<fn() -> S>,
}

impl<S: TransferableState> RecipeDeserializationFactory<S> {
    /// Bind to `recipe`.
    pub fn new(recipe: Recipe) -> Self {
        Self {
            recipe,
            _state: PhantomData,
        }
    }

    /// The bound recipe.
    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }
}

impl<S: TransferableState> DeserializationProxyFactory for RecipeDeserializationFactory<S> {
    fn recipe_name(&self) -> &str {
        self.recipe.name()
    }

    fn deserialize(&self, engine: &ProxyEngine, token: &ProxyToken) -> ProxyResult<Proxy> {
        if token.recipe != self.recipe.name() {
            return Err(ProxyError::InvalidProxyState(format!(
                "token of recipe `{}` handed to the factory of `{}`",
                token.recipe,
                self.recipe.name()
            )));
        }

        let excluded = self.excluded_contracts();
        let expected: Vec<ContractId> = self
            .recipe
            .capabilities()
            .ids()
            .into_iter()
            .filter(|id| !excluded.contains(id))
            .collect();
        let actual: Vec<ContractId> = token
            .contracts
            .iter()
            .filter(|id| !excluded.contains(id))
            .cloned()
            .collect();
        if expected != actual {
            return Err(ProxyError::InvalidProxyState(format!(
                "token contracts {:?} do not match recipe `{}` contracts {:?}",
                actual,
                self.recipe.name(),
                expected
            )));
        }

        let state: S = serde_json::from_value(token.state.clone()).map_err(|e| {
            ProxyError::InvalidProxyState(format!(
                "cannot restore `{}` from token: {}",
                type_name::<S>(),
                e
            ))
        })?;
        engine.instantiate_serializable_with_args(&self.recipe, state, token.constructor.clone())
    }
}

impl<S> fmt::Debug for RecipeDeserializationFactory<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeDeserializationFactory")
            .field("recipe", &self.recipe.name())
            .field("state", &type_name::<S>())
            .finish()
    }
}
