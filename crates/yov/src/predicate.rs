//! matchers
//!
//! A [Predicate] decides whether a base item is targeted by an overlay item. It is called with
//! the index of the base item, the base item's value and the overlay item's value.
//!
//! The functions in this module build the predicates available to overlay annotations
//! (`overlay.all`, `overlay.index(n)`, `overlay.map_key("name")`, ...).
use crate::value::{Fragment, Scalar};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type PredicateFn = dyn Fn(usize, &Fragment, &Fragment) -> Result<bool, EvalError> + Send + Sync;

#[derive(Clone)]
pub struct Predicate {
    name: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(usize, &Fragment, &Fragment) -> Result<bool, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, index: usize, base: &Fragment, overlay: &Fragment) -> Result<bool, EvalError> {
        (self.func)(index, base, overlay)
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predicate({})", self.name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Expected value to be a map, but was {0}")]
    NotAMap(&'static str),
    #[error("Expected to find map item with key '{0}'")]
    MissingKey(Scalar),
    #[error("{0}")]
    Failed(String),
}

/// Matches every item
pub fn all() -> Predicate {
    Predicate::new("overlay.all", |_, _, _| Ok(true))
}

/// Matches the item at `index`
pub fn index(index: usize) -> Predicate {
    Predicate::new(format!("overlay.index({index})"), move |i, _, _| {
        Ok(i == index)
    })
}

/// Matches when base and overlay values are maps holding equal values under `key`
///
/// Fails when either side is not a map or lacks the key.
pub fn map_key(key: impl Into<Scalar>) -> Predicate {
    let key = key.into();
    Predicate::new(format!("overlay.map_key({key})"), move |_, base, overlay| {
        Ok(map_value(base, &key)? == map_value(overlay, &key)?)
    })
}

/// Matches when base and overlay are equal
///
/// Map items without a `by` argument are matched with this predicate on their keys.
pub fn equal() -> Predicate {
    Predicate::new("equal", |_, base, overlay| Ok(base == overlay))
}

fn map_value<'f>(fragment: &'f Fragment, key: &Scalar) -> Result<&'f Fragment, EvalError> {
    fragment
        .as_map()
        .ok_or(EvalError::NotAMap(fragment.type_name()))?
        .get(key)
        .ok_or_else(|| EvalError::MissingKey(key.clone()))
}

/// Matches base values that contain `expected`
///
/// Maps contain another map when every entry of the other map is contained under the same key,
/// arrays when they have the same length and contain each other element-wise, scalars when equal.
pub fn subset(expected: Fragment) -> Predicate {
    Predicate::new("overlay.subset", move |_, base, _| {
        Ok(contains(base, &expected))
    })
}

fn contains(base: &Fragment, expected: &Fragment) -> bool {
    match (base, expected) {
        (Fragment::Map(base), Fragment::Map(expected)) => expected.iter().all(|(key, value)| {
            base.get(key)
                .is_some_and(|base_value| contains(base_value, value))
        }),
        (Fragment::Array(base), Fragment::Array(expected)) => {
            base.len() == expected.len()
                && base.iter().zip(expected).all(|(b, e)| contains(b, e))
        }
        (base, expected) => base == expected,
    }
}

pub fn not(predicate: Predicate) -> Predicate {
    Predicate::new(format!("overlay.not_op({})", predicate.name), move |i, b, o| {
        Ok(!predicate.call(i, b, o)?)
    })
}

/// Matches when all predicates match; stops at the first that does not
pub fn and(predicates: Vec<Predicate>) -> Predicate {
    Predicate::new("overlay.and_op", move |i, b, o| {
        for predicate in &predicates {
            if !predicate.call(i, b, o)? {
                return Ok(false);
            }
        }
        Ok(true)
    })
}

/// Matches when any predicate matches; stops at the first that does
pub fn or(predicates: Vec<Predicate>) -> Predicate {
    Predicate::new("overlay.or_op", move |i, b, o| {
        for predicate in &predicates {
            if predicate.call(i, b, o)? {
                return Ok(true);
            }
        }
        Ok(false)
    })
}
