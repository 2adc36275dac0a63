//! merge executor
//!
//! Applies overlay documents to a base document set. Every overlay node picks an [Op] through
//! its annotations (`overlay/merge` when none is given) and targets the base items its
//! [ItemMatch] selects:
//!
//! | op        | matched base items                          | no match (if allowed)   |
//! |-----------|---------------------------------------------|-------------------------|
//! | merge     | merged recursively (maps/arrays), else set  | overlay item is added   |
//! | replace   | value replaced                              | overlay item is added   |
//! | remove    | removed                                     | nothing                 |
//! | append    | (array items only) added at the end         |                         |
//!
//! Touched base nodes get the metadata entry [META_OP] naming the applied op.
use crate::annotation;
use crate::expects::MatchChildDefaults;
use crate::matching::{ItemMatch, MatchError};
use crate::node::{Kind, Node, NodeError};
use crate::position::Position;
use crate::value::Value;

/// Metadata key set on base nodes an overlay changed
pub const META_OP: &str = "overlay/op";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Merge,
    Replace,
    Remove,
    Append,
}

impl Op {
    const ALL: [Op; 4] = [Op::Merge, Op::Replace, Op::Remove, Op::Append];

    pub fn annotation(self) -> &'static str {
        match self {
            Op::Merge => annotation::MERGE,
            Op::Replace => annotation::REPLACE,
            Op::Remove => annotation::REMOVE,
            Op::Append => annotation::APPEND,
        }
    }

    /// Op requested by the annotations of `node`
    pub fn of(node: &Node) -> Result<Op, OverlayError> {
        let requested: Vec<Op> = Op::ALL
            .into_iter()
            .filter(|op| node.annotations().has(op.annotation()))
            .collect();

        match requested.as_slice() {
            [] => Ok(Op::Merge),
            [op] => Ok(*op),
            _ => Err(OverlayError::ConflictingOps {
                position: node.position().clone(),
                ops: requested
                    .iter()
                    .map(|op| op.annotation())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.annotation())
    }
}

/// Applies every document of `overlays` to `base`, in order
///
/// Both nodes must be document sets.
pub fn apply(base: &mut Node, overlays: &Node) -> Result<(), OverlayError> {
    for node in [&*base, overlays] {
        if node.kind() != Kind::DocumentSet {
            return Err(OverlayError::NotADocumentSet(node.kind()));
        }
    }

    for document in overlays.items() {
        tracing::debug!(position = %document.position(), "applying overlay document");
        apply_item(base, document, &MatchChildDefaults::default())?;
    }

    Ok(())
}

fn apply_item(
    base: &mut Node,
    new_item: &Node,
    defaults: &MatchChildDefaults,
) -> Result<(), OverlayError> {
    let op = Op::of(new_item)?;
    let context = |source: MatchError| OverlayError::Match {
        op,
        kind: new_item.kind(),
        position: new_item.position().clone(),
        source,
    };

    if op == Op::Append {
        if new_item.kind() != Kind::ArrayItem {
            return Err(OverlayError::AppendOutsideArray {
                kind: new_item.kind(),
                position: new_item.position().clone(),
            });
        }
        return insert(base, new_item, op);
    }

    let item_match = ItemMatch::new(new_item, defaults).map_err(context)?;
    let indices = item_match.indexes(base).map_err(context)?;
    tracing::debug!(%op, position = %new_item.position(), ?indices, "applying overlay item");

    match op {
        Op::Remove => {
            for index in indices.into_iter().rev() {
                base.remove_item(index);
            }
        }
        Op::Replace | Op::Merge if indices.is_empty() => insert(base, new_item, op)?,
        Op::Replace => {
            for index in indices {
                let Some(target) = base.item_mut(index) else {
                    continue;
                };
                target.set_value(value_of(new_item)).map_err(|source| {
                    OverlayError::Node {
                        position: new_item.position().clone(),
                        source,
                    }
                })?;
                target.set_meta(META_OP, op.to_string());
            }
        }
        Op::Merge => {
            let child_defaults =
                MatchChildDefaults::for_children(new_item, defaults).map_err(context)?;
            for index in indices {
                let Some(target) = base.item_mut(index) else {
                    continue;
                };
                merge(target, new_item, &child_defaults)?;
                target.set_meta(META_OP, op.to_string());
            }
        }
        Op::Append => {}
    }

    Ok(())
}

/// Merges the value of `new_item` into the value of `target`
///
/// Maps merge into maps and arrays into arrays, item by item. Anything else replaces the value.
fn merge(
    target: &mut Node,
    new_item: &Node,
    defaults: &MatchChildDefaults,
) -> Result<(), OverlayError> {
    let new_collection = new_item.value().and_then(Value::as_node);

    if let (Some(base_collection), Some(new_collection)) = (target.value_node_mut(), new_collection)
    {
        if base_collection.kind() == new_collection.kind() {
            for child in new_collection.items() {
                apply_item(base_collection, child, defaults)?;
            }
            return Ok(());
        }
    }

    target
        .set_value(value_of(new_item))
        .map_err(|source| OverlayError::Node {
            position: new_item.position().clone(),
            source,
        })
}

fn insert(base: &mut Node, new_item: &Node, op: Op) -> Result<(), OverlayError> {
    let mut item = new_item.clone();
    item.set_meta(META_OP, op.to_string());

    base.add_value(item).map_err(|source| OverlayError::Node {
        position: new_item.position().clone(),
        source,
    })
}

fn value_of(item: &Node) -> Value {
    item.value().cloned().unwrap_or_else(Value::null)
}

#[derive(thiserror::Error, Debug)]
pub enum OverlayError {
    #[error("overlays apply to document sets, not to a {0}")]
    NotADocumentSet(Kind),
    #[error("{position}: conflicting annotations {ops}")]
    ConflictingOps { position: Position, ops: String },
    #[error("{position}: '{}' only applies to array items, not to a {kind}", annotation::APPEND)]
    AppendOutsideArray { kind: Kind, position: Position },
    #[error("{position}: unable to {op} {kind}")]
    Match {
        op: Op,
        kind: Kind,
        position: Position,
        #[source]
        source: MatchError,
    },
    #[error("{position}: unable to update base")]
    Node {
        position: Position,
        #[source]
        source: NodeError,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::annotation::{Annotation, ArgValue};
    use crate::value::Fragment;
    use crate::{fragment_array, fragment_map, predicate};
    use pretty_assertions::assert_eq;

    fn annotated(mut node: Node, name: &str, kwargs: Vec<(&str, ArgValue)>) -> Node {
        let mut annotations = node.annotations().clone();
        annotations.insert(
            name,
            Annotation::new(
                vec![],
                kwargs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                Position::unknown(),
            ),
        );
        node.set_annotations(annotations);
        node
    }

    fn document(value: Fragment) -> Node {
        let mut document = Node::document();
        document.add_value(value).unwrap();
        document
    }

    fn set(documents: Vec<Node>) -> Node {
        let mut set = Node::document_set();
        for document in documents {
            set.add_value(document).unwrap();
        }
        set
    }

    fn overlay_doc(value: Fragment) -> Node {
        annotated(
            document(value),
            annotation::MATCH,
            vec![("by", ArgValue::Predicate(predicate::all()))],
        )
    }

    fn result(base: &Node) -> Vec<Fragment> {
        base.items().iter().map(Node::to_fragment).collect()
    }

    #[test]
    fn maps_merge_recursively() {
        let mut base = set(vec![document(fragment_map! {
            "name" => "app",
            "spec" => fragment_map! {"replicas" => 1, "image" => "app:1"},
        })]);
        let overlay = set(vec![overlay_doc(fragment_map! {
            "spec" => fragment_map! {"replicas" => 3, "port" => 80},
        })]);

        let mut strict = base.clone();
        assert!(matches!(
            apply(&mut strict, &overlay),
            Err(OverlayError::Match {
                kind: Kind::MapItem,
                source: MatchError::Cardinality { found: 0, .. },
                ..
            })
        ));

        let overlay = set(vec![annotated(
            overlay.items()[0].clone(),
            annotation::MATCH_CHILD_DEFAULTS,
            vec![("missing_ok", ArgValue::Bool(true))],
        )]);
        apply(&mut base, &overlay).unwrap();

        assert_eq!(
            result(&base),
            vec![fragment_map! {
                "name" => "app",
                "spec" => fragment_map! {"replicas" => 3, "image" => "app:1", "port" => 80},
            }]
        );
        assert_eq!(
            base.items()[0].meta(META_OP),
            Some(&serde_json::json!("overlay/merge"))
        );
    }

    #[test]
    fn array_items_merge_by_key() {
        let mut base = set(vec![document(fragment_map! {
            "containers" => fragment_array![
                fragment_map! {"name" => "web", "image" => "web:1"},
                fragment_map! {"name" => "sidecar", "image" => "proxy:1"},
            ],
        })]);

        let mut containers = Node::array();
        containers
            .add_value(annotated(
                {
                    let mut item = Node::array_item();
                    item.add_value(fragment_map! {"name" => "sidecar", "image" => "proxy:2"})
                        .unwrap();
                    item
                },
                annotation::MATCH,
                vec![("by", ArgValue::String("name".into()))],
            ))
            .unwrap();
        let mut containers_item = Node::map_item("containers");
        containers_item.add_value(containers).unwrap();
        let mut map = Node::map();
        map.add_value(containers_item).unwrap();
        let overlay = set(vec![annotated(
            {
                let mut doc = Node::document();
                doc.add_value(map).unwrap();
                doc
            },
            annotation::MATCH,
            vec![("by", ArgValue::Predicate(predicate::all()))],
        )]);

        apply(&mut base, &overlay).unwrap();

        assert_eq!(
            result(&base),
            vec![fragment_map! {
                "containers" => fragment_array![
                    fragment_map! {"name" => "web", "image" => "web:1"},
                    fragment_map! {"name" => "sidecar", "image" => "proxy:2"},
                ],
            }]
        );
    }

    #[test]
    fn remove_and_replace() {
        let mut base = set(vec![
            document(fragment_map! {"kind" => "Service", "port" => 80}),
            document(fragment_map! {"kind" => "Deployment", "replicas" => 1}),
        ]);

        let removal = annotated(
            annotated(
                document(fragment_map! {"kind" => "Service"}),
                annotation::MATCH,
                vec![("by", ArgValue::String("kind".into()))],
            ),
            annotation::REMOVE,
            vec![],
        );
        let replacement = annotated(
            annotated(
                document(fragment_map! {"kind" => "Deployment"}),
                annotation::MATCH,
                vec![("by", ArgValue::String("kind".into()))],
            ),
            annotation::REPLACE,
            vec![],
        );

        apply(&mut base, &set(vec![removal, replacement])).unwrap();

        assert_eq!(result(&base), vec![fragment_map! {"kind" => "Deployment"}]);
        assert_eq!(
            base.items()[0].meta(META_OP),
            Some(&serde_json::json!("overlay/replace"))
        );
    }

    #[test]
    fn missing_items_are_added_when_allowed() {
        let mut base = set(vec![document(fragment_map! {"a" => 1})]);

        let mut new_key = Node::map_item("b");
        new_key.add_value(2).unwrap();
        let new_key = annotated(
            new_key,
            annotation::MATCH,
            vec![("missing_ok", ArgValue::Bool(true))],
        );
        let mut map = Node::map();
        map.add_value(new_key).unwrap();
        let mut doc = Node::document();
        doc.add_value(map).unwrap();
        let doc = annotated(
            doc,
            annotation::MATCH,
            vec![("by", ArgValue::Predicate(predicate::all()))],
        );

        apply(&mut base, &set(vec![doc])).unwrap();

        assert_eq!(result(&base), vec![fragment_map! {"a" => 1, "b" => 2}]);
    }

    #[test]
    fn unmatched_map_item_is_an_error_by_default() {
        let mut base = set(vec![document(fragment_map! {"a" => 1})]);
        let overlay = set(vec![overlay_doc(fragment_map! {"b" => 2})]);

        let err = apply(&mut base, &overlay).unwrap_err();
        assert!(matches!(
            err,
            OverlayError::Match {
                kind: Kind::MapItem,
                source: MatchError::Cardinality { found: 0, .. },
                ..
            }
        ));
    }

    #[test]
    fn append_adds_to_arrays_only() {
        let mut base = set(vec![document(fragment_array![1, 2])]);

        let mut item = Node::array_item();
        item.add_value(3).unwrap();
        let mut array = Node::array();
        array
            .add_value(annotated(item, annotation::APPEND, vec![]))
            .unwrap();
        let mut doc = Node::document();
        doc.add_value(array).unwrap();
        let doc = annotated(
            doc,
            annotation::MATCH,
            vec![("by", ArgValue::Predicate(predicate::all()))],
        );

        apply(&mut base, &set(vec![doc])).unwrap();
        assert_eq!(result(&base), vec![fragment_array![1, 2, 3]]);

        let appended_doc = annotated(document(Fragment::from(1)), annotation::APPEND, vec![]);
        assert!(matches!(
            apply(&mut base, &set(vec![appended_doc])),
            Err(OverlayError::AppendOutsideArray {
                kind: Kind::Document,
                ..
            })
        ));
    }

    #[test]
    fn conflicting_ops_are_rejected() {
        let node = annotated(
            annotated(Node::array_item(), annotation::REMOVE, vec![]),
            annotation::REPLACE,
            vec![],
        );

        let err = Op::of(&node).unwrap_err();
        assert_eq!(
            err.to_string(),
            "?: conflicting annotations overlay/replace, overlay/remove"
        );
        assert_eq!(Op::of(&Node::array_item()).unwrap(), Op::Merge);
    }

    #[test]
    fn child_defaults_apply_to_descendants() {
        let mut base = set(vec![document(fragment_map! {"a" => 1})]);

        let mut map = Node::map();
        for (key, value) in [("b", 2), ("c", 3)] {
            let mut item = Node::map_item(key);
            item.add_value(value).unwrap();
            map.add_value(item).unwrap();
        }
        let mut doc = Node::document();
        doc.add_value(map).unwrap();
        let doc = annotated(
            annotated(
                doc,
                annotation::MATCH,
                vec![("by", ArgValue::Predicate(predicate::all()))],
            ),
            annotation::MATCH_CHILD_DEFAULTS,
            vec![("missing_ok", ArgValue::Bool(true))],
        );

        apply(&mut base, &set(vec![doc])).unwrap();
        assert_eq!(
            result(&base),
            vec![fragment_map! {"a" => 1, "b" => 2, "c" => 3}]
        );
    }

    #[test]
    fn scalars_replace_collections() {
        let mut base = set(vec![document(fragment_map! {"a" => fragment_array![1]})]);
        let overlay = set(vec![overlay_doc(fragment_map! {"a" => "flat"})]);

        apply(&mut base, &overlay).unwrap();
        assert_eq!(result(&base), vec![fragment_map! {"a" => "flat"}]);
    }
}
