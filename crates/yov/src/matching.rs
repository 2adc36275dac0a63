//! matching engine
//!
//! Resolves which items of a base collection an overlay item targets. An [ItemMatch] is built
//! from the `overlay/match` annotation of the overlay item:
//!
//! ```yaml
//! #@overlay/match by="name", expects="1+"
//! - name: frontend
//! ```
//!
//! `by` is either a map key (`by="name"`, same as `by=overlay.map_key("name")`) or a
//! [Predicate]. Map items may omit the annotation, they are then matched by key.
use crate::annotation::{self, ArgValue};
use crate::expects::{Expects, ExpectsKwarg, MatchChildDefaults, MatchedLines};
use crate::node::{Kind, Node};
use crate::position::Position;
use crate::predicate::{self, EvalError, Predicate};
use crate::value::{Fragment, Scalar};
use std::collections::HashSet;

/// Value of the `by` argument
#[derive(Debug, Clone)]
pub enum Matcher {
    Key(String),
    Predicate(Predicate),
}

impl Matcher {
    pub fn from_arg(value: &ArgValue) -> Result<Self, MatchError> {
        match value {
            ArgValue::String(key) => Ok(Matcher::Key(key.clone())),
            ArgValue::Predicate(predicate) => Ok(Matcher::Predicate(predicate.clone())),
            other => Err(MatchError::InvalidBy(other.type_name())),
        }
    }

    pub fn into_predicate(self) -> Predicate {
        match self {
            Matcher::Key(key) => predicate::map_key(key),
            Matcher::Predicate(predicate) => predicate,
        }
    }
}

/// What a predicate is shown of each item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Value,
    Key,
}

impl Subject {
    fn of(self, item: &Node) -> Fragment {
        match self {
            Subject::Value => item.to_fragment(),
            Subject::Key => Fragment::Scalar(item.key().cloned().unwrap_or(Scalar::Null)),
        }
    }
}

/// Match directive of one overlay item
#[derive(Debug, Clone)]
pub struct ItemMatch<'a> {
    new_item: &'a Node,
    predicate: Predicate,
    subject: Subject,
    expects: ExpectsKwarg,
}

struct Directive {
    by: Option<Matcher>,
    expects: ExpectsKwarg,
}

impl Directive {
    fn read(
        item: &Node,
        defaults: &MatchChildDefaults,
        required: bool,
    ) -> Result<Self, MatchError> {
        let mut directive = Directive {
            by: None,
            expects: ExpectsKwarg::default(),
        };

        if !item.annotations().has(annotation::MATCH) {
            if required {
                return Err(MatchError::MissingAnnotation(item.kind()));
            }
            directive.expects.fill_in_defaults(&defaults.expects);
            return Ok(directive);
        }

        let kwargs = item.annotations().kwargs(annotation::MATCH);
        if kwargs.is_empty() {
            return Err(MatchError::NoKeywordArguments);
        }

        let mut seen = HashSet::new();
        for (name, value) in kwargs {
            if !seen.insert(name.as_str()) {
                return Err(MatchError::DuplicateKeywordArgument {
                    annotation: annotation::MATCH,
                    name: name.clone(),
                });
            }

            if name == annotation::KWARG_BY {
                directive.by = Some(Matcher::from_arg(value)?);
            } else if !directive.expects.apply_kwarg(name, value)? {
                return Err(MatchError::UnknownKeywordArgument {
                    annotation: annotation::MATCH,
                    name: name.clone(),
                });
            }
        }

        directive.expects.fill_in_defaults(&defaults.expects);
        Ok(directive)
    }
}

impl<'a> ItemMatch<'a> {
    /// Directive of any matchable item
    pub fn new(new_item: &'a Node, defaults: &MatchChildDefaults) -> Result<Self, MatchError> {
        match new_item.kind() {
            Kind::ArrayItem => Self::array_item(new_item, defaults),
            Kind::MapItem => Self::map_item(new_item, defaults),
            Kind::Document => Self::document(new_item, defaults),
            kind @ (Kind::DocumentSet | Kind::Map | Kind::Array) => {
                Err(MatchError::Unmatchable(kind))
            }
        }
    }

    /// Array items need the annotation with a `by` argument
    pub fn array_item(
        new_item: &'a Node,
        defaults: &MatchChildDefaults,
    ) -> Result<Self, MatchError> {
        Self::with_required_by(new_item, defaults)
    }

    /// Documents need the annotation with a `by` argument
    pub fn document(new_item: &'a Node, defaults: &MatchChildDefaults) -> Result<Self, MatchError> {
        Self::with_required_by(new_item, defaults)
    }

    /// Map items match by key unless a `by` argument says otherwise
    pub fn map_item(new_item: &'a Node, defaults: &MatchChildDefaults) -> Result<Self, MatchError> {
        let directive = Directive::read(new_item, defaults, false)?;
        let (predicate, subject) = match directive.by {
            Some(by) => (by.into_predicate(), Subject::Value),
            None => (predicate::equal(), Subject::Key),
        };

        Ok(Self {
            new_item,
            predicate,
            subject,
            expects: directive.expects,
        })
    }

    fn with_required_by(
        new_item: &'a Node,
        defaults: &MatchChildDefaults,
    ) -> Result<Self, MatchError> {
        let directive = Directive::read(new_item, defaults, true)?;
        let by = directive.by.ok_or(MatchError::MissingBy)?;

        Ok(Self {
            new_item,
            predicate: by.into_predicate(),
            subject: Subject::Value,
            expects: directive.expects,
        })
    }

    pub fn new_item(&self) -> &'a Node {
        self.new_item
    }

    pub fn expects(&self) -> &ExpectsKwarg {
        &self.expects
    }

    /// Indices and positions of the targeted items of `base`, in base order
    ///
    /// Stops at the first failing predicate call.
    #[tracing::instrument(level = "trace", skip_all, fields(item = %self.new_item.position()))]
    pub fn match_nodes(&self, base: &Node) -> Result<(Vec<usize>, Vec<Position>), MatchError> {
        self.check_target(base)?;

        let mut indices = vec![];
        let mut positions = vec![];

        let predicate = &self.predicate;
        let overlay_value = self.subject.of(self.new_item);
        for (index, item) in base.items().iter().enumerate() {
            let base_value = self.subject.of(item);
            let matched = predicate
                .call(index, &base_value, &overlay_value)
                .map_err(|source| MatchError::Eval {
                    matcher: predicate.name().to_string(),
                    index,
                    source,
                })?;
            tracing::trace!(index, matched, matcher = predicate.name());

            if matched {
                indices.push(index);
                positions.push(item.position().clone());
            }
        }

        tracing::debug!(?indices, "matched");
        Ok((indices, positions))
    }

    /// [ItemMatch::match_nodes] followed by the cardinality check
    pub fn indexes(&self, base: &Node) -> Result<Vec<usize>, MatchError> {
        let (indices, positions) = self.match_nodes(base)?;
        self.expects.check(&positions)?;
        Ok(indices)
    }

    fn check_target(&self, base: &Node) -> Result<(), MatchError> {
        let item = self.new_item.kind();
        match item.collection_kind() {
            Some(expected) if expected == base.kind() => Ok(()),
            Some(expected) => Err(MatchError::TargetKind {
                item,
                expected,
                found: base.kind(),
            }),
            None => Err(MatchError::Unmatchable(item)),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("Expected {0} to have 'overlay/match' annotation")]
    MissingAnnotation(Kind),
    #[error("Expected 'overlay/match' annotation to have at least one keyword argument (by=..., expects=...)")]
    NoKeywordArguments,
    #[error("Unknown '{annotation}' annotation keyword argument '{name}'")]
    UnknownKeywordArgument {
        annotation: &'static str,
        name: String,
    },
    #[error("Duplicate '{annotation}' annotation keyword argument '{name}'")]
    DuplicateKeywordArgument {
        annotation: &'static str,
        name: String,
    },
    #[error("Expected 'overlay/match' annotation keyword argument 'by' to be specified")]
    MissingBy,
    #[error("Expected 'overlay/match' annotation keyword argument 'by' to be either string (for map key) or function, but was {0}")]
    InvalidBy(&'static str),
    #[error("Expected 'expects' keyword argument to be an int, a string like \"1\" or \"1+\", or a list of those, but was {0}")]
    InvalidExpects(String),
    #[error("Expected 'missing_ok' keyword argument to be a bool, but was {0}")]
    InvalidMissingOk(&'static str),
    #[error("cannot match {item} against items of {found}, expected {expected}")]
    TargetKind {
        item: Kind,
        expected: Kind,
        found: Kind,
    },
    #[error("{0}s are not matched against anything")]
    Unmatchable(Kind),
    #[error("matcher {matcher} failed on item {index}")]
    Eval {
        matcher: String,
        index: usize,
        #[source]
        source: EvalError,
    },
    #[error("Expected number of matched nodes to be {expects}, but was {found}{lines}")]
    Cardinality {
        expects: Expects,
        found: usize,
        lines: MatchedLines,
    },
}
