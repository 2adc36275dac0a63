//! yaml loading
//!
//! Builds a [Kind::DocumentSet] tree from yaml text. The yaml parser reports no comments, so
//! comments are collected per line beforehand and claimed by the first item (map item, array
//! item, or a document starting with `---`) that starts on their line. Comments on lines of
//! their own belong to the next line with content.
//!
//! Comments starting with `#@` are parsed as annotations, everything else is kept as a plain
//! [Comment].
use crate::annotation::syntax::{self, SyntaxError};
use crate::node::{Comment, Kind, Node, NodeError};
use crate::position::Position;
use crate::value::{Scalar, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};
use yaml_rust2::Yaml;

/// Loads all documents of `content`; `file` is used for positions
pub fn load_str(content: &str, file: Option<&str>) -> Result<Node, LoadError> {
    let file: Option<Arc<str>> = file.map(Arc::from);
    let comments = CommentIndex::scan(content, &file);
    let mut builder = TreeBuilder::new(file, comments);

    let mut parser = Parser::new_from_str(content);
    parser.load(&mut builder, true)?;

    builder.finish()
}

pub fn load_file(path: &Path) -> Result<Node, LoadError> {
    tracing::info!(path=%path.display(), "loading file");

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&content, Some(&path.display().to_string()))
}

/// Loads the files in order into one document set
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Node, LoadError> {
    let mut set = Node::document_set();

    for path in paths {
        for document in load_file(path.as_ref())?.into_items() {
            let position = document.position().clone();
            set.add_value(document)
                .map_err(|source| LoadError::Node { position, source })?;
        }
    }

    Ok(set)
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("unable to read {}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse yaml")]
    YamlParseFailed(#[from] yaml_rust2::ScanError),
    #[error("invalid annotation")]
    Annotation(#[from] SyntaxError),
    #[error("{position}: unable to build tree")]
    Node {
        position: Position,
        #[source]
        source: NodeError,
    },
    #[error("{position}: {what} are not supported")]
    Unsupported {
        position: Position,
        what: &'static str,
    },
    #[error("{position}: annotation '{name}' is not attached to any node")]
    DanglingAnnotation { position: Position, name: String },
    #[error("{position}: annotation '{name}' is given more than once for the same node")]
    DuplicateAnnotation { position: Position, name: String },
}

/// Comments of a source text, by the line they attach to
#[derive(Debug, Default)]
struct CommentIndex {
    by_line: BTreeMap<usize, Vec<Comment>>,
    document_starts: HashSet<usize>,
    trailing: Vec<Comment>,
}

impl CommentIndex {
    fn scan(source: &str, file: &Option<Arc<str>>) -> Self {
        let mut index = CommentIndex::default();
        let mut pending = vec![];
        // indentation of the line that opened a block scalar
        let mut block_scalar: Option<usize> = None;

        for (i, line) in source.lines().enumerate() {
            let number = i + 1;
            let indent = line.len() - line.trim_start().len();

            if let Some(block_indent) = block_scalar {
                if line.trim().is_empty() || indent > block_indent {
                    continue;
                }
                block_scalar = None;
            }

            if line.starts_with("---") {
                index.document_starts.insert(number);
            }

            let (content, comment) = split_comment(line);
            if let Some(text) = comment {
                pending.push(Comment::new(
                    text.trim_end().to_string(),
                    Position::new(file.clone(), number),
                ));
            }
            if !content.trim().is_empty() {
                index
                    .by_line
                    .entry(number)
                    .or_default()
                    .append(&mut pending);
            }

            if opens_block_scalar(content) {
                block_scalar = Some(indent);
            }
        }

        index.trailing = pending;
        index
    }

    fn claim(&mut self, line: usize) -> Vec<Comment> {
        self.by_line.remove(&line).unwrap_or_default()
    }
}

/// Splits a line at the `#` starting a comment, ignoring `#` in quoted scalars
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    let mut prev = ' ';
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match quote {
            Some('"') if c == '\\' => {
                chars.next();
            }
            Some('\'') if c == '\'' && matches!(chars.peek(), Some((_, '\''))) => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '#' && prev.is_whitespace() => return (&line[..i], Some(&line[i + 1..])),
            None if (c == '"' || c == '\'')
                && (prev.is_whitespace() || matches!(prev, ':' | '[' | '{' | ',' | '-')) =>
            {
                quote = Some(c)
            }
            None => {}
        }
        prev = c;
    }

    (line, None)
}

/// `key: |`, `- >-`, ...
fn opens_block_scalar(content: &str) -> bool {
    let content = content.trim_end();
    let Some(indicator) = content.split_whitespace().last() else {
        return false;
    };
    let mut chars = indicator.chars();
    let is_indicator = matches!(chars.next(), Some('|' | '>'))
        && chars.all(|c| c == '+' || c == '-' || c.is_ascii_digit());
    let before = content[..content.len() - indicator.len()].trim_end();

    is_indicator && (before.is_empty() || before.ends_with(':') || before.ends_with('-'))
}

enum Frame {
    Document(Node),
    /// `pending` is the map item whose value is being read
    Map { node: Node, pending: Option<Node> },
    /// `pending` is the array item whose value is being read
    Array { node: Node, pending: Option<Node> },
}

struct TreeBuilder {
    file: Option<Arc<str>>,
    comments: CommentIndex,
    set: Node,
    stack: Vec<Frame>,
    error: Option<LoadError>,
}

impl TreeBuilder {
    fn new(file: Option<Arc<str>>, comments: CommentIndex) -> Self {
        Self {
            set: Node::document_set().with_position(Position::new(file.clone(), 1)),
            file,
            comments,
            stack: vec![],
            error: None,
        }
    }

    fn finish(mut self) -> Result<Node, LoadError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let leftovers = std::mem::take(&mut self.comments.by_line)
            .into_values()
            .flatten()
            .chain(std::mem::take(&mut self.comments.trailing));
        for comment in leftovers {
            if let Some(text) = comment.data.strip_prefix('@') {
                let (name, _) = syntax::parse(text, &comment.position)?;
                return Err(LoadError::DanglingAnnotation {
                    position: comment.position,
                    name,
                });
            }
            self.set.add_comment(comment);
        }

        Ok(self.set)
    }

    fn position(&self, marker: &Marker) -> Position {
        Position::new(self.file.clone(), marker.line())
    }

    fn handle(&mut self, event: Event, marker: Marker) -> Result<(), LoadError> {
        match event {
            Event::Nothing | Event::StreamStart | Event::StreamEnd => {}
            Event::DocumentStart => {
                let mut document = Node::document().with_position(self.position(&marker));
                if self.comments.document_starts.contains(&marker.line()) {
                    self.attach_comments(&mut document, marker.line())?;
                }
                self.stack.push(Frame::Document(document));
            }
            Event::DocumentEnd => {
                if let Some(Frame::Document(document)) = self.stack.pop() {
                    let position = document.position().clone();
                    self.set
                        .add_value(document)
                        .map_err(|source| LoadError::Node { position, source })?;
                }
            }
            Event::Scalar(value, style, _anchor, tag) => {
                let scalar = scalar(value, style, tag);
                if let Some(Frame::Map { pending: None, .. }) = self.stack.last() {
                    let mut item = Node::map_item(scalar).with_position(self.position(&marker));
                    self.attach_comments(&mut item, marker.line())?;
                    if let Some(Frame::Map { pending, .. }) = self.stack.last_mut() {
                        *pending = Some(item);
                    }
                } else {
                    self.begin_value(&marker)?;
                    self.deliver(scalar.into(), &marker)?;
                }
            }
            Event::SequenceStart(_anchor, _tag) => {
                self.begin_value(&marker)?;
                self.stack.push(Frame::Array {
                    node: Node::array().with_position(self.position(&marker)),
                    pending: None,
                });
            }
            Event::MappingStart(_anchor, _tag) => {
                self.begin_value(&marker)?;
                self.stack.push(Frame::Map {
                    node: Node::map().with_position(self.position(&marker)),
                    pending: None,
                });
            }
            Event::SequenceEnd | Event::MappingEnd => match self.stack.pop() {
                Some(Frame::Array { node, .. } | Frame::Map { node, .. }) => {
                    self.deliver(node.into(), &marker)?
                }
                Some(frame) => self.stack.push(frame),
                None => {}
            },
            Event::Alias(_) => {
                return Err(LoadError::Unsupported {
                    position: self.position(&marker),
                    what: "aliases",
                })
            }
        }

        Ok(())
    }

    /// Opens the array item a value of an array is read into
    fn begin_value(&mut self, marker: &Marker) -> Result<(), LoadError> {
        match self.stack.last() {
            Some(Frame::Map { pending: None, .. }) => Err(LoadError::Unsupported {
                position: self.position(marker),
                what: "non-scalar keys",
            }),
            Some(Frame::Array { pending: None, .. }) => {
                let mut item = Node::array_item().with_position(self.position(marker));
                self.attach_comments(&mut item, marker.line())?;
                if let Some(Frame::Array { pending, .. }) = self.stack.last_mut() {
                    *pending = Some(item);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Hands a finished value to the innermost open holder
    fn deliver(&mut self, value: Value, marker: &Marker) -> Result<(), LoadError> {
        let position = self.position(marker);
        let node_error = |source| LoadError::Node {
            position: position.clone(),
            source,
        };

        match self.stack.last_mut() {
            Some(Frame::Document(document)) => document.add_value(value).map_err(node_error),
            Some(Frame::Map { node, pending } | Frame::Array { node, pending }) => {
                let Some(mut item) = pending.take() else {
                    return Err(node_error(NodeError::ChildKind {
                        container: node.kind(),
                        expected: node.kind().item_kind().unwrap_or(Kind::MapItem),
                        found: value.type_name(),
                    }));
                };
                item.add_value(value).map_err(node_error)?;
                node.add_value(item).map_err(node_error)
            }
            None => Err(LoadError::Unsupported {
                position,
                what: "values outside of documents",
            }),
        }
    }

    fn attach_comments(&mut self, node: &mut Node, line: usize) -> Result<(), LoadError> {
        for comment in self.comments.claim(line) {
            match comment.data.strip_prefix('@') {
                Some(text) => {
                    let (name, annotation) = syntax::parse(text, &comment.position)?;
                    tracing::trace!(%name, position=%comment.position, "annotation");
                    if node.annotations_mut().insert(name.clone(), annotation).is_some() {
                        return Err(LoadError::DuplicateAnnotation {
                            position: comment.position,
                            name,
                        });
                    }
                }
                None => node.add_comment(comment),
            }
        }
        Ok(())
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, marker: Marker) {
        if self.error.is_some() {
            return;
        }
        if let Err(error) = self.handle(event, marker) {
            self.error = Some(error);
        }
    }
}

fn scalar(value: String, style: TScalarStyle, tag: Option<Tag>) -> Scalar {
    let tagged_str = tag.is_some_and(|tag| tag.suffix == "str");
    if !matches!(style, TScalarStyle::Plain) || tagged_str {
        return Scalar::String(value);
    }

    match Yaml::from_str(&value) {
        Yaml::Null => Scalar::Null,
        Yaml::Boolean(b) => Scalar::Bool(b),
        Yaml::Integer(i) => Scalar::Int(i),
        real @ Yaml::Real(_) => match (value.parse::<u64>(), real.as_f64()) {
            (Ok(u), _) => Scalar::UInt(u),
            (Err(_), Some(f)) => Scalar::Float(f),
            (Err(_), None) => Scalar::String(value),
        },
        _ => Scalar::String(value),
    }
}
