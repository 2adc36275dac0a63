//! annotations attached to nodes
//!
//! Annotations are written as comments starting with `#@` (see [syntax]). The node model stores
//! them without interpreting them; the matching engine and the overlay executor read them.
//!
//! ```yaml
//! #@overlay/match by="name", missing_ok=True
//! - name: frontend
//!   replicas: 3
//! ```
pub mod syntax;

use crate::position::Position;
use crate::predicate::Predicate;
use crate::value::{Fragment, Scalar};
use indexmap::IndexMap;

pub const MATCH: &str = "overlay/match";
pub const MATCH_CHILD_DEFAULTS: &str = "overlay/match-child-defaults";
pub const MERGE: &str = "overlay/merge";
pub const REPLACE: &str = "overlay/replace";
pub const REMOVE: &str = "overlay/remove";
pub const APPEND: &str = "overlay/append";

pub const KWARG_BY: &str = "by";
pub const KWARG_EXPECTS: &str = "expects";
pub const KWARG_MISSING_OK: &str = "missing_ok";

/// Argument of an annotation
#[derive(Debug, Clone)]
pub enum ArgValue {
    None,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<ArgValue>),
    Dict(Vec<(ArgValue, ArgValue)>),
    Predicate(Predicate),
}

impl ArgValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::None => "None",
            ArgValue::Bool(_) => "bool",
            ArgValue::Int(_) => "int",
            ArgValue::String(_) => "string",
            ArgValue::List(_) => "list",
            ArgValue::Dict(_) => "dict",
            ArgValue::Predicate(_) => "function",
        }
    }

    /// Data held by this argument, `None` if it contains a function
    pub fn to_fragment(&self) -> Option<Fragment> {
        Some(match self {
            ArgValue::None => Scalar::Null.into(),
            ArgValue::Bool(b) => (*b).into(),
            ArgValue::Int(i) => (*i).into(),
            ArgValue::String(s) => s.as_str().into(),
            ArgValue::List(list) => Fragment::Array(
                list.iter()
                    .map(ArgValue::to_fragment)
                    .collect::<Option<_>>()?,
            ),
            ArgValue::Dict(entries) => {
                let mut map = IndexMap::new();
                for (key, value) in entries {
                    let Fragment::Scalar(key) = key.to_fragment()? else {
                        return None;
                    };
                    map.insert(key, value.to_fragment()?);
                }
                Fragment::Map(map)
            }
            ArgValue::Predicate(_) => return None,
        })
    }
}

#[derive(Debug, Clone, Default, derive_new::new)]
pub struct Annotation {
    pub args: Vec<ArgValue>,
    pub kwargs: Vec<(String, ArgValue)>,
    pub position: Position,
}

/// Annotations of a node, by name
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    entries: IndexMap<String, Annotation>,
}

impl Annotations {
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Annotation> {
        self.entries.get(name)
    }

    /// Keyword arguments of annotation `name`, empty if the annotation is absent
    pub fn kwargs(&self, name: &str) -> &[(String, ArgValue)] {
        self.entries
            .get(name)
            .map(|annotation| annotation.kwargs.as_slice())
            .unwrap_or_default()
    }

    /// Adds an annotation, replacing an earlier one of the same name
    pub fn insert(&mut self, name: impl Into<String>, annotation: Annotation) -> Option<Annotation> {
        self.entries.insert(name.into(), annotation)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Annotation)> for Annotations {
    fn from_iter<T: IntoIterator<Item = (N, Annotation)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(n, a)| (n.into(), a)).collect(),
        }
    }
}
