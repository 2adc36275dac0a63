//! cardinality of matches
//!
//! How many base items an overlay item may match is controlled by the `expects` and
//! `missing_ok` keyword arguments of `overlay/match`:
//!
//! | argument            | accepted match counts |
//! |---------------------|-----------------------|
//! | (none)              | exactly 1             |
//! | `expects=2`         | exactly 2             |
//! | `expects="2+"`      | 2 or more             |
//! | `expects=[0, "2+"]` | 0, or 2 or more       |
//! | `missing_ok=True`   | 0 in addition to the above |
//!
//! `overlay/match-child-defaults` sets fallbacks for all descendants of the annotated node.
use crate::annotation::{self, ArgValue};
use crate::matching::MatchError;
use crate::node::Node;
use crate::position::Position;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expects {
    Exactly(usize),
    AtLeast(usize),
    AnyOf(Vec<Expects>),
}

impl Expects {
    pub fn allows(&self, count: usize) -> bool {
        match self {
            Expects::Exactly(n) => count == *n,
            Expects::AtLeast(n) => count >= *n,
            Expects::AnyOf(options) => options.iter().any(|option| option.allows(count)),
        }
    }

    pub fn from_arg(value: &ArgValue) -> Result<Self, MatchError> {
        let invalid = || MatchError::InvalidExpects(describe(value));

        match value {
            ArgValue::Int(n) => usize::try_from(*n).map(Expects::Exactly).map_err(|_| invalid()),
            ArgValue::String(s) => {
                let (digits, at_least) = match s.strip_suffix('+') {
                    Some(digits) => (digits, true),
                    None => (s.as_str(), false),
                };
                let n: usize = digits.trim().parse().map_err(|_| invalid())?;
                Ok(if at_least {
                    Expects::AtLeast(n)
                } else {
                    Expects::Exactly(n)
                })
            }
            ArgValue::List(options) if !options.is_empty() => options
                .iter()
                .map(|option| match option {
                    ArgValue::List(_) => Err(invalid()),
                    option => Expects::from_arg(option),
                })
                .collect::<Result<_, _>>()
                .map(Expects::AnyOf),
            _ => Err(invalid()),
        }
    }
}

fn describe(value: &ArgValue) -> String {
    match value.to_fragment() {
        Some(fragment) => match serde_json::to_string(&fragment) {
            Ok(json) => format!("{} ({json})", value.type_name()),
            Err(_) => value.type_name().to_string(),
        },
        None => value.type_name().to_string(),
    }
}

impl Display for Expects {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expects::Exactly(n) => write!(f, "{n}"),
            Expects::AtLeast(n) => write!(f, "{n}+"),
            Expects::AnyOf(options) => {
                for (i, option) in options.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{option}")?;
                }
                Ok(())
            }
        }
    }
}

/// The `expects`/`missing_ok` part of a match directive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectsKwarg {
    pub expects: Option<Expects>,
    pub missing_ok: Option<bool>,
}

impl ExpectsKwarg {
    /// Records `name=value` if it is one of the cardinality arguments
    ///
    /// Returns `false` for other argument names.
    pub fn apply_kwarg(&mut self, name: &str, value: &ArgValue) -> Result<bool, MatchError> {
        match name {
            annotation::KWARG_EXPECTS => self.expects = Some(Expects::from_arg(value)?),
            annotation::KWARG_MISSING_OK => match value {
                ArgValue::Bool(b) => self.missing_ok = Some(*b),
                other => return Err(MatchError::InvalidMissingOk(other.type_name())),
            },
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Takes values from `defaults` where none were given
    pub fn fill_in_defaults(&mut self, defaults: &ExpectsKwarg) {
        if self.expects.is_none() {
            self.expects = defaults.expects.clone();
        }
        if self.missing_ok.is_none() {
            self.missing_ok = defaults.missing_ok;
        }
    }

    /// The rule [ExpectsKwarg::check] enforces
    pub fn effective(&self) -> Expects {
        let expects = self.expects.clone().unwrap_or(Expects::Exactly(1));
        match self.missing_ok {
            Some(true) if !expects.allows(0) => Expects::AnyOf(vec![Expects::Exactly(0), expects]),
            _ => expects,
        }
    }

    pub fn check(&self, matches: &[Position]) -> Result<(), MatchError> {
        let expects = self.effective();
        if expects.allows(matches.len()) {
            return Ok(());
        }

        tracing::debug!(%expects, found = matches.len(), "unexpected number of matches");
        Err(MatchError::Cardinality {
            expects,
            found: matches.len(),
            lines: MatchedLines(matches.to_vec()),
        })
    }
}

/// Cardinality defaults of `overlay/match-child-defaults`, inherited by descendants
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchChildDefaults {
    pub expects: ExpectsKwarg,
}

impl MatchChildDefaults {
    /// Defaults for the children of `node`: its own annotation, falling back to `parent`
    pub fn for_children(node: &Node, parent: &MatchChildDefaults) -> Result<Self, MatchError> {
        let mut expects = ExpectsKwarg::default();
        let mut seen = HashSet::new();
        for (name, value) in node
            .annotations()
            .kwargs(annotation::MATCH_CHILD_DEFAULTS)
        {
            if !seen.insert(name.as_str()) {
                return Err(MatchError::DuplicateKeywordArgument {
                    annotation: annotation::MATCH_CHILD_DEFAULTS,
                    name: name.clone(),
                });
            }
            if !expects.apply_kwarg(name, value)? {
                return Err(MatchError::UnknownKeywordArgument {
                    annotation: annotation::MATCH_CHILD_DEFAULTS,
                    name: name.clone(),
                });
            }
        }

        expects.fill_in_defaults(&parent.expects);
        Ok(Self { expects })
    }
}

/// Positions of matched items, rendered as ` (lines: a.yml:1, a.yml:4)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedLines(pub Vec<Position>);

impl Display for MatchedLines {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }

        f.write_str(" (lines: ")?;
        for (i, position) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{position}")?;
        }
        f.write_str(")")
    }
}
