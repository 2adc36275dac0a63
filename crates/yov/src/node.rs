//! document tree model
//!
//! A loaded bundle is a tree of [Node]s of six [Kind]s:
//!
//! | kind           | holds                                   |
//! |----------------|-----------------------------------------|
//! | `DocumentSet`  | documents                               |
//! | `Document`     | one value                               |
//! | `Map`          | map items                               |
//! | `MapItem`      | a scalar key and one value              |
//! | `Array`        | array items                             |
//! | `ArrayItem`    | one value                               |
//!
//! Every node carries the same side channels: a [Position], [Comment]s, [Annotations] and
//! transient metadata. Maps and arrays have no textual position a comment can anchor to, so
//! attaching a comment to them is an [InvariantViolation].
//!
//! All structural mutation goes through [Node::add_value] and [Node::set_value], which enforce
//! that collections only receive their item kind and that value holders only receive legal
//! values (see [is_legal_value]). Mutable access to children stays inside the crate.
use crate::annotation::Annotations;
use crate::position::Position;
use crate::value::{is_legal_value, Fragment, Scalar, Value, ValueRef};
use std::collections::HashMap;

/// Node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    DocumentSet,
    Document,
    Map,
    MapItem,
    Array,
    ArrayItem,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::DocumentSet => "document set",
            Kind::Document => "document",
            Kind::Map => "map",
            Kind::MapItem => "map item",
            Kind::Array => "array",
            Kind::ArrayItem => "array item",
        }
    }

    /// Kind of the children of a collection, `None` for value holders
    pub fn item_kind(self) -> Option<Kind> {
        match self {
            Kind::DocumentSet => Some(Kind::Document),
            Kind::Map => Some(Kind::MapItem),
            Kind::Array => Some(Kind::ArrayItem),
            Kind::Document | Kind::MapItem | Kind::ArrayItem => None,
        }
    }

    /// Kind of the collection an item lives in, `None` for collections
    pub fn collection_kind(self) -> Option<Kind> {
        match self {
            Kind::Document => Some(Kind::DocumentSet),
            Kind::MapItem => Some(Kind::Map),
            Kind::ArrayItem => Some(Kind::Array),
            Kind::DocumentSet | Kind::Map | Kind::Array => None,
        }
    }

    pub fn holds_value(self) -> bool {
        self.item_kind().is_none()
    }

    fn with_article(self) -> String {
        match self {
            Kind::Array | Kind::ArrayItem => format!("an {self}"),
            _ => format!("a {self}"),
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct Comment {
    pub data: String,
    pub position: Position,
}

#[derive(Debug, Clone)]
enum Body {
    DocumentSet(Vec<Node>),
    Document(Value),
    Map(Vec<Node>),
    MapItem { key: Scalar, value: Value },
    Array(Vec<Node>),
    ArrayItem(Value),
}

/// A node of any [Kind]
#[derive(Debug, Clone)]
pub struct Node {
    body: Body,
    position: Position,
    comments: Vec<Comment>,
    annotations: Annotations,
    meta: HashMap<String, serde_json::Value>,
}

impl Node {
    /// Creates an empty node: no children, or a `null` value
    pub fn new(kind: Kind) -> Self {
        let body = match kind {
            Kind::DocumentSet => Body::DocumentSet(vec![]),
            Kind::Document => Body::Document(Value::null()),
            Kind::Map => Body::Map(vec![]),
            Kind::MapItem => Body::MapItem {
                key: Scalar::Null,
                value: Value::null(),
            },
            Kind::Array => Body::Array(vec![]),
            Kind::ArrayItem => Body::ArrayItem(Value::null()),
        };

        Self::from_body(body)
    }

    fn from_body(body: Body) -> Self {
        Self {
            body,
            position: Position::unknown(),
            comments: vec![],
            annotations: Annotations::default(),
            meta: HashMap::new(),
        }
    }

    pub fn document_set() -> Self {
        Self::new(Kind::DocumentSet)
    }

    pub fn document() -> Self {
        Self::new(Kind::Document)
    }

    pub fn map() -> Self {
        Self::new(Kind::Map)
    }

    pub fn map_item(key: impl Into<Scalar>) -> Self {
        Self::from_body(Body::MapItem {
            key: key.into(),
            value: Value::null(),
        })
    }

    pub fn array() -> Self {
        Self::new(Kind::Array)
    }

    pub fn array_item() -> Self {
        Self::new(Kind::ArrayItem)
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn kind(&self) -> Kind {
        match self.body {
            Body::DocumentSet(_) => Kind::DocumentSet,
            Body::Document(_) => Kind::Document,
            Body::Map(_) => Kind::Map,
            Body::MapItem { .. } => Kind::MapItem,
            Body::Array(_) => Kind::Array,
            Body::ArrayItem(_) => Kind::ArrayItem,
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Always empty for maps and arrays
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Attaches a comment
    ///
    /// # Panic
    /// Maps and arrays cannot carry comments. Attaching one is a bug in the caller and raises an
    /// [InvariantViolation].
    pub fn add_comment(&mut self, comment: Comment) {
        match self.kind() {
            Kind::Map | Kind::Array => InvariantViolation::CommentOnContainer {
                kind: self.kind(),
                comment: comment.data,
                position: self.position.clone(),
            }
            .raise(),
            Kind::DocumentSet | Kind::Document | Kind::MapItem | Kind::ArrayItem => {
                self.comments.push(comment)
            }
        }
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    pub fn set_annotations(&mut self, annotations: Annotations) {
        self.annotations = annotations;
    }

    pub fn meta(&self, name: &str) -> Option<&serde_json::Value> {
        self.meta.get(name)
    }

    pub fn set_meta(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.meta.insert(name.into(), value.into());
    }

    /// The node's payload: its children for collections, its single value otherwise
    pub fn values(&self) -> Vec<ValueRef<'_>> {
        match &self.body {
            Body::DocumentSet(items) | Body::Map(items) | Body::Array(items) => {
                items.iter().map(ValueRef::Node).collect()
            }
            Body::Document(value) | Body::MapItem { value, .. } | Body::ArrayItem(value) => {
                vec![value.as_value_ref()]
            }
        }
    }

    /// Appends a child to a collection or installs the value of a value holder
    ///
    /// The node is left untouched on error.
    pub fn add_value(&mut self, value: impl Into<Value>) -> Result<(), NodeError> {
        let kind = self.kind();
        let value = value.into();

        match kind.item_kind() {
            Some(expected) => match value {
                Value::Node(node) if node.kind() == expected => {
                    self.push_item(*node);
                    Ok(())
                }
                other => Err(NodeError::ChildKind {
                    container: kind,
                    expected,
                    found: other.type_name(),
                }),
            },
            None if is_legal_value(&value) => {
                self.install(value);
                Ok(())
            }
            None => Err(NodeError::IllegalValue {
                holder: kind,
                found: value.type_name(),
            }),
        }
    }

    /// Replaces the value of a value holder
    ///
    /// The old value is cleared before the new one is validated.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), NodeError> {
        if !self.kind().holds_value() {
            return Err(NodeError::CannotSetValue(self.kind()));
        }

        self.install(Value::null());
        self.add_value(value)
    }

    fn push_item(&mut self, node: Node) {
        if let Body::DocumentSet(items) | Body::Map(items) | Body::Array(items) = &mut self.body {
            items.push(node);
        }
    }

    fn install(&mut self, new_value: Value) {
        if let Body::Document(value) | Body::MapItem { value, .. } | Body::ArrayItem(value) =
            &mut self.body
        {
            *value = new_value;
        }
    }

    /// Children of a collection, empty for value holders
    pub fn items(&self) -> &[Node] {
        match &self.body {
            Body::DocumentSet(items) | Body::Map(items) | Body::Array(items) => items,
            Body::Document(_) | Body::MapItem { .. } | Body::ArrayItem(_) => &[],
        }
    }

    /// Child of a collection, for in-place updates by the merge executor
    pub(crate) fn item_mut(&mut self, index: usize) -> Option<&mut Node> {
        match &mut self.body {
            Body::DocumentSet(items) | Body::Map(items) | Body::Array(items) => {
                items.get_mut(index)
            }
            Body::Document(_) | Body::MapItem { .. } | Body::ArrayItem(_) => None,
        }
    }

    pub fn into_items(self) -> Vec<Node> {
        match self.body {
            Body::DocumentSet(items) | Body::Map(items) | Body::Array(items) => items,
            Body::Document(_) | Body::MapItem { .. } | Body::ArrayItem(_) => vec![],
        }
    }

    pub fn remove_item(&mut self, index: usize) -> Option<Node> {
        match &mut self.body {
            Body::DocumentSet(items) | Body::Map(items) | Body::Array(items)
                if index < items.len() =>
            {
                Some(items.remove(index))
            }
            _ => None,
        }
    }

    /// Value of a value holder
    pub fn value(&self) -> Option<&Value> {
        match &self.body {
            Body::Document(value) | Body::MapItem { value, .. } | Body::ArrayItem(value) => {
                Some(value)
            }
            Body::DocumentSet(_) | Body::Map(_) | Body::Array(_) => None,
        }
    }

    /// The map or array held by a value holder
    pub(crate) fn value_node_mut(&mut self) -> Option<&mut Node> {
        match &mut self.body {
            Body::Document(value) | Body::MapItem { value, .. } | Body::ArrayItem(value) => {
                value.as_node_mut()
            }
            Body::DocumentSet(_) | Body::Map(_) | Body::Array(_) => None,
        }
    }

    pub fn key(&self) -> Option<&Scalar> {
        match &self.body {
            Body::MapItem { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Semantic value of this node
    ///
    /// Items and documents yield their value, collections yield all of their children's values.
    pub fn to_fragment(&self) -> Fragment {
        match &self.body {
            Body::DocumentSet(items) | Body::Array(items) => {
                Fragment::Array(items.iter().map(Node::to_fragment).collect())
            }
            Body::Map(items) => Fragment::Map(
                items
                    .iter()
                    .map(|item| {
                        let key = item.key().cloned().unwrap_or(Scalar::Null);
                        (key, item.to_fragment())
                    })
                    .collect(),
            ),
            Body::Document(value) | Body::MapItem { value, .. } | Body::ArrayItem(value) => {
                value.to_fragment()
            }
        }
    }
}

/// Normalizes a fragment into map/array nodes
impl From<Fragment> for Value {
    fn from(value: Fragment) -> Self {
        match value {
            Fragment::Scalar(scalar) => Value::Scalar(scalar),
            Fragment::Array(elements) => {
                let items = elements
                    .into_iter()
                    .map(|element| Node::from_body(Body::ArrayItem(element.into())))
                    .collect();
                Node::from_body(Body::Array(items)).into()
            }
            Fragment::Map(entries) => {
                let items = entries
                    .into_iter()
                    .map(|(key, value)| {
                        Node::from_body(Body::MapItem {
                            key,
                            value: value.into(),
                        })
                    })
                    .collect();
                Node::from_body(Body::Map(items)).into()
            }
        }
    }
}

/// Nodes are only turned into text by [crate::render]
///
/// # Panic
/// Always raises an [InvariantViolation]
impl serde::ser::Serialize for Node {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        InvariantViolation::Serialization(self.kind()).raise()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("cannot add non-{expected} value ({found}) into {container}")]
    ChildKind {
        container: Kind,
        expected: Kind,
        found: &'static str,
    },
    #[error("{holder}s can only contain arrays, maps, or scalars; this is a {found}")]
    IllegalValue { holder: Kind, found: &'static str },
    #[error("cannot set value on {}", .0.with_article())]
    CannotSetValue(Kind),
}

/// Bugs in the pipeline, as opposed to bad input
///
/// These are never returned as errors. [InvariantViolation::raise] aborts the current run.
#[derive(thiserror::Error, Debug)]
pub enum InvariantViolation {
    #[error("attempted to attach comment ({comment}) to {kind} at {position}; {kind}s cannot carry comments")]
    CommentOnContainer {
        kind: Kind,
        comment: String,
        position: Position,
    },
    #[error("unexpected serialization of {0}")]
    Serialization(Kind),
}

impl InvariantViolation {
    pub fn raise(self) -> ! {
        tracing::error!(violation = %self, "invariant violated");
        panic!("invariant violation: {self}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_KINDS: [Kind; 6] = [
        Kind::DocumentSet,
        Kind::Document,
        Kind::Map,
        Kind::MapItem,
        Kind::Array,
        Kind::ArrayItem,
    ];

    fn item_with(value: impl Into<Value>) -> Node {
        let mut item = Node::array_item();
        item.add_value(value).unwrap();
        item
    }

    #[test]
    fn collections_keep_insertion_order() {
        let mut array = Node::array();
        for n in 0..5 {
            array.add_value(item_with(n)).unwrap();
        }

        let values: Vec<_> = array
            .values()
            .into_iter()
            .map(|value| match value {
                ValueRef::Node(node) => node.to_fragment(),
                ValueRef::Scalar(_) => panic!("collections hold nodes"),
            })
            .collect();

        assert_eq!(values, (0..5).map(Fragment::from).collect::<Vec<_>>());
    }

    #[test]
    fn collections_reject_foreign_children() {
        for kind in [Kind::DocumentSet, Kind::Map, Kind::Array] {
            let item_kind = kind.item_kind().unwrap();
            let mut collection = Node::new(kind);
            collection.add_value(Node::new(item_kind)).unwrap();

            let mut rejected: Vec<Value> = ALL_KINDS
                .into_iter()
                .filter(|other| *other != item_kind)
                .map(|other| Node::new(other).into())
                .collect();
            rejected.push("scalar".into());
            rejected.push(Value::null());

            for value in rejected {
                let found = value.type_name();
                assert_eq!(
                    collection.add_value(value),
                    Err(NodeError::ChildKind {
                        container: kind,
                        expected: item_kind,
                        found,
                    })
                );
            }

            assert_eq!(collection.items().len(), 1);
            assert_eq!(collection.items()[0].kind(), item_kind);
        }
    }

    #[test]
    fn children_are_updated_through_checked_entry_points() {
        let mut array = Node::array();
        array.add_value(item_with(Node::map())).unwrap();

        let item = array.item_mut(0).unwrap();
        assert!(item.set_value(Node::document_set()).is_err());
        item.set_value(Node::map()).unwrap();

        let held = item.value_node_mut().unwrap();
        assert!(held.add_value(Node::document()).is_err());
        held.add_value(Node::map_item("k")).unwrap();

        assert!(array.item_mut(1).is_none());
        assert!(Node::document().item_mut(0).is_none());
        assert!(item_with(1).value_node_mut().is_none());
        assert_eq!(array.items()[0].kind(), Kind::ArrayItem);
        assert_eq!(
            array.to_fragment(),
            crate::fragment_array![crate::fragment_map! {"k" => Scalar::Null}]
        );
    }

    #[test]
    fn child_kind_error_names_the_offender() {
        let mut set = Node::document_set();
        let err = set.add_value(Node::map_item("key")).unwrap_err();

        assert_eq!(
            err.to_string(),
            "cannot add non-document value (map item) into document set"
        );
    }

    #[test]
    fn value_holders_reject_non_collection_nodes() {
        for holder in [Kind::Document, Kind::MapItem, Kind::ArrayItem] {
            let mut node = Node::new(holder);
            node.add_value(1).unwrap();

            let err = node.add_value(Node::document()).unwrap_err();
            assert_eq!(
                err,
                NodeError::IllegalValue {
                    holder,
                    found: "document"
                }
            );
            assert!(matches!(node.value(), Some(Value::Scalar(Scalar::Int(1)))));
        }
    }

    #[test]
    fn set_value_replaces() {
        let mut doc = Node::document();
        doc.set_value(Node::map()).unwrap();
        doc.set_value("text").unwrap();

        assert_eq!(doc.values().len(), 1);
        assert_eq!(doc.to_fragment(), Fragment::from("text"));
    }

    #[test]
    fn set_value_clears_before_validating() {
        let mut item = item_with(42);
        assert!(item.set_value(Node::array_item()).is_err());
        assert!(matches!(item.value(), Some(Value::Scalar(Scalar::Null))));
    }

    #[test]
    fn containers_reject_set_value() {
        for kind in [Kind::DocumentSet, Kind::Map, Kind::Array] {
            let inputs: Vec<Value> = vec![
                Value::null(),
                1.into(),
                Node::map().into(),
                Node::new(kind.item_kind().unwrap()).into(),
            ];
            for input in inputs {
                let mut node = Node::new(kind);
                assert_eq!(node.set_value(input), Err(NodeError::CannotSetValue(kind)));
                assert!(node.items().is_empty());
            }
        }

        assert_eq!(
            Node::array().set_value(1).unwrap_err().to_string(),
            "cannot set value on an array"
        );
    }

    #[test]
    fn comments_attach_to_items_and_documents() {
        for kind in [
            Kind::DocumentSet,
            Kind::Document,
            Kind::MapItem,
            Kind::ArrayItem,
        ] {
            let mut node = Node::new(kind);
            node.add_comment(Comment::new("note".into(), Position::unknown()));
            assert_eq!(node.comments().len(), 1);
        }
    }

    #[test]
    #[should_panic(expected = "maps cannot carry comments")]
    fn comment_on_map_is_a_fault() {
        Node::map().add_comment(Comment::new("".into(), Position::unknown()));
    }

    #[test]
    #[should_panic(expected = "arrays cannot carry comments")]
    fn comment_on_array_is_a_fault() {
        Node::array().add_comment(Comment::new("note".into(), Position::unknown()));
    }

    #[test]
    #[should_panic(expected = "unexpected serialization of map item")]
    fn direct_serialization_is_a_fault() {
        let _ = serde_json::to_string(&Node::map_item("key"));
    }

    #[test]
    fn meta_is_per_key() {
        for kind in ALL_KINDS {
            let mut node = Node::new(kind);
            assert_eq!(node.meta("x"), None);

            node.set_meta("x", 5);
            assert_eq!(node.meta("x"), Some(&serde_json::json!(5)));
            assert_eq!(node.meta("y"), None);
        }
    }

    #[test]
    fn side_channels_are_uniform() {
        for kind in ALL_KINDS {
            let mut node = Node::new(kind);
            let position = Position::new(Some("a.yml".into()), 4);
            node.set_position(position.clone());
            assert_eq!(node.position(), &position);
            assert!(node.annotations().is_empty());
        }
    }

    #[test]
    fn fragments_round_trip_through_nodes() {
        let fragment = crate::fragment_map! {
            "name" => "a",
            "ports" => crate::fragment_array![80, 443],
        };

        let value = Value::from(fragment.clone());
        let map = value.as_node().unwrap();

        assert_eq!(map.kind(), Kind::Map);
        assert_eq!(
            map.items()[1].value().and_then(Value::as_node).map(Node::kind),
            Some(Kind::Array)
        );
        assert_eq!(value.to_fragment(), fragment);
    }
}
