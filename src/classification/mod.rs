//! # Method classification
//!
//! A classification pairs an operation matcher with the handler servicing
//! matched operations. Classifications are evaluated in declaration order
//! and the first match wins; the winning classification, curried with any
//! context it computes for the operation, is what the classification cache
//! memoizes.

pub mod classifier;
pub mod invocation;
pub mod matcher;
pub mod predicate;

pub use classifier::{Classification, ClassificationSet, Resolution, ResolvedClassification};
pub use invocation::{HandlerContext, Invocation, InvocationHandlerFn};
pub use matcher::{MatchFn, MethodMatcher};
pub use predicate::{ContextFactoryFn, CurriedClassification, PredicateClassification};
