//! The process-wide registry of built-in intrinsic functions.
//!
//! The registry is populated once during initialization (see
//! [`crate::funcs::install_builtins`]) and is read-only afterwards. Names are
//! fully qualified and dotted (`States.Format`); registering a duplicate or a
//! name beginning with `$` is refused, since `$`-prefixed lexemes always
//! resolve as JSONPath variables.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::value::Value;

/// A callable registered under a dotted name.
pub trait IntrinsicCallable: Send + Sync {
    /// The exact number of arguments accepted, or `None` when variadic.
    fn arity(&self) -> Option<usize>;

    /// Invoke the callable with already-evaluated arguments.
    fn call(&self, interpreter: &Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError>;
}

/// Errors raised when registering a callable.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("name '{0}' is already registered; try another name")]
    Duplicate(String),

    #[error("names beginning with '$' are reserved for JSONPath values")]
    ReservedName,
}

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<dyn IntrinsicCallable>>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Register `callable` under `name`.
pub fn register(name: &str, callable: Arc<dyn IntrinsicCallable>) -> Result<(), RegistryError> {
    if name.starts_with('$') {
        return Err(RegistryError::ReservedName);
    }

    let mut registry = REGISTRY.write().expect("intrinsic registry poisoned");
    if registry.contains_key(name) {
        return Err(RegistryError::Duplicate(name.to_string()));
    }

    registry.insert(name.to_string(), callable);
    Ok(())
}

/// Look up a callable by its fully-qualified name.
pub fn lookup(name: &str) -> Option<Arc<dyn IntrinsicCallable>> {
    crate::funcs::install_builtins();
    REGISTRY.read().expect("intrinsic registry poisoned").get(name).cloned()
}
