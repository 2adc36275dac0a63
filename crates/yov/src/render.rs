//! output
//!
//! The only place trees are turned back into text. Every document is reduced to its
//! [Fragment](crate::value::Fragment) first; annotations, comments, positions and metadata are
//! not part of the output.
use crate::node::{Kind, Node};

/// Documents as a yaml stream, separated by `---`
pub fn to_yaml(set: &Node) -> Result<String, RenderError> {
    let mut out = String::new();

    for (i, document) in documents(set)?.iter().enumerate() {
        if i > 0 {
            out.push_str("---\n");
        }
        out.push_str(&serde_yaml::to_string(&document.to_fragment())?);
    }

    Ok(out)
}

/// Documents as pretty printed json values, one after another
pub fn to_json(set: &Node) -> Result<String, RenderError> {
    let mut out = String::new();

    for document in documents(set)? {
        out.push_str(&serde_json::to_string_pretty(&document.to_fragment())?);
        out.push('\n');
    }

    Ok(out)
}

fn documents(set: &Node) -> Result<&[Node], RenderError> {
    match set.kind() {
        Kind::DocumentSet => Ok(set.items()),
        kind => Err(RenderError::NotADocumentSet(kind)),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("only document sets can be rendered, not a {0}")]
    NotADocumentSet(Kind),
    #[error("unable to write yaml")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unable to write json")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{fragment_array, fragment_map};
    use pretty_assertions::assert_eq;

    fn set() -> Node {
        let mut set = Node::document_set();
        for fragment in [
            fragment_map! {"name" => "app", "ports" => fragment_array![80, 443]},
            fragment_array!["x"],
        ] {
            let mut document = Node::document();
            document.add_value(fragment).unwrap();
            set.add_value(document).unwrap();
        }
        set
    }

    #[test]
    fn yaml_separates_documents() {
        assert_eq!(
            to_yaml(&set()).unwrap(),
            "name: app\nports:\n- 80\n- 443\n---\n- x\n"
        );
    }

    #[test]
    fn json_prints_each_document() {
        assert_eq!(
            to_json(&set()).unwrap(),
            "{\n  \"name\": \"app\",\n  \"ports\": [\n    80,\n    443\n  ]\n}\n[\n  \"x\"\n]\n"
        );
    }

    #[test]
    fn empty_set_renders_nothing() {
        assert_eq!(to_yaml(&Node::document_set()).unwrap(), "");
    }

    #[test]
    fn only_document_sets_render() {
        assert!(matches!(
            to_yaml(&Node::map()),
            Err(RenderError::NotADocumentSet(Kind::Map))
        ));
    }
}
