//! value representation
//!
//! Nodes hold one of the following
//! - null
//! - boolean (true/false)
//! - integer (signed: i64, unsigned: u64 - only used when the value does not fit an i64)
//! - float (f64)
//! - string (utf-8)
//! - a map or an array node
//!
//! Every integer width folds into `Int`/`UInt` and every float width into `Float`, so the set of
//! legal leaf shapes is closed and [is_legal_value] is a single exhaustive match.
//!
//! A [Fragment] is the semantic value of a node without any of the tree's side channels
//! (positions, comments, annotations, metadata). Fragments are what matchers compare and what
//! the renderer serializes.
use crate::node::Node;
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Leaf values
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) | Scalar::UInt(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::String(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Scalar::Int(i) => Some(*i as i128),
            Scalar::UInt(u) => Some(*u as i128),
            _ => None,
        }
    }
}

// Int and UInt compare by magnitude, floats by bit pattern so that Eq and Hash agree.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::String(a), Scalar::String(b)) => a == b,
            (a, b) => match (a.as_i128(), b.as_i128()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Scalar::Null => 0u8.hash(state),
            Scalar::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Scalar::Int(_) | Scalar::UInt(_) => {
                2u8.hash(state);
                self.as_i128().hash(state);
            }
            Scalar::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            Scalar::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::UInt(u) => write!(f, "{u}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

macro_rules! scalar_from {
    ($variant:ident as $target:ty: $($source:ty),+) => {
        $(
            impl From<$source> for Scalar {
                fn from(value: $source) -> Self {
                    Scalar::$variant(value as $target)
                }
            }
        )+
    };
}

scalar_from!(Int as i64: i8, i16, i32, i64, u8, u16, u32);
scalar_from!(Float as f64: f32, f64);

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(Scalar::Int)
            .unwrap_or(Scalar::UInt(value))
    }
}

impl From<usize> for Scalar {
    fn from(value: usize) -> Self {
        (value as u64).into()
    }
}

impl From<isize> for Scalar {
    fn from(value: isize) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl serde::ser::Serialize for Scalar {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(value) => serializer.serialize_bool(*value),
            Scalar::Int(value) => serializer.serialize_i64(*value),
            Scalar::UInt(value) => serializer.serialize_u64(*value),
            Scalar::Float(value) => serializer.serialize_f64(*value),
            Scalar::String(value) => serializer.serialize_str(value),
        }
    }
}

/// Payload of a value-holding node (document, map item, array item)
#[derive(Debug, Clone)]
pub enum Value {
    Node(Box<Node>),
    Scalar(Scalar),
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    /// Name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Node(node) => node.kind().name(),
            Value::Scalar(scalar) => scalar.type_name(),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            Value::Scalar(_) => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Value::Node(node) => Some(node),
            Value::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Node(_) => None,
            Value::Scalar(scalar) => Some(scalar),
        }
    }

    pub fn as_value_ref(&self) -> ValueRef<'_> {
        match self {
            Value::Node(node) => ValueRef::Node(node),
            Value::Scalar(scalar) => ValueRef::Scalar(scalar),
        }
    }

    pub fn to_fragment(&self) -> Fragment {
        match self {
            Value::Node(node) => node.to_fragment(),
            Value::Scalar(scalar) => Fragment::Scalar(scalar.clone()),
        }
    }
}

/// Decides whether `candidate` may be held by a document, map item or array item.
///
/// Only map and array nodes are legal as node values; every other node kind has to be
/// unwrapped to its semantic value first.
pub fn is_legal_value(candidate: &Value) -> bool {
    use crate::node::Kind;

    match candidate {
        Value::Scalar(_) => true,
        Value::Node(node) => match node.kind() {
            Kind::Map | Kind::Array => true,
            Kind::DocumentSet | Kind::Document | Kind::MapItem | Kind::ArrayItem => false,
        },
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Value::Node(Box::new(value))
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        Value::Scalar(value)
    }
}

macro_rules! value_from_scalar {
    ($($source:ty),+) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::Scalar(value.into())
                }
            }
        )+
    };
}

value_from_scalar!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String, &str
);

/// Borrowed view of a node's values, see [Node::values]
#[derive(Debug, Clone, Copy)]
pub enum ValueRef<'a> {
    Node(&'a Node),
    Scalar(&'a Scalar),
}

/// Semantic value of a node, independent of its place in a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Scalar(Scalar),
    Array(Vec<Fragment>),
    /// order-preserving map
    Map(IndexMap<Scalar, Fragment>),
}

impl Fragment {
    pub fn type_name(&self) -> &'static str {
        match self {
            Fragment::Scalar(scalar) => scalar.type_name(),
            Fragment::Array(_) => "array",
            Fragment::Map(_) => "map",
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<Scalar, Fragment>> {
        match self {
            Fragment::Map(map) => Some(map),
            _ => None,
        }
    }
}

macro_rules! fragment_from_scalar {
    ($($source:ty),+) => {
        $(
            impl From<$source> for Fragment {
                fn from(value: $source) -> Self {
                    Fragment::Scalar(value.into())
                }
            }
        )+
    };
}

fragment_from_scalar!(
    Scalar, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String, &str
);

impl<K: Into<Scalar>, V: Into<Fragment>> FromIterator<(K, V)> for Fragment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fragment::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl serde::ser::Serialize for Fragment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Fragment::Scalar(value) => value.serialize(serializer),
            Fragment::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Fragment::Map(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

/// Builds a [Fragment::Array]
#[macro_export]
macro_rules! fragment_array {
    ($($item:expr),* $(,)?) => {
        $crate::value::Fragment::Array(vec![$($crate::value::Fragment::from($item)),*])
    };
}

/// Builds a [Fragment::Map]
#[macro_export]
macro_rules! fragment_map {
    ($($key:expr => $value:expr),* $(,)?) => {
        $crate::value::Fragment::Map(
            [$(($crate::value::Scalar::from($key), $crate::value::Fragment::from($value))),*]
                .into_iter()
                .collect(),
        )
    };
}
