//! annotation comment syntax
//!
//! `#@<name> <arguments>` where arguments are a comma separated list of values, optionally
//! prefixed with `<keyword>=`. Positional arguments must come before keyword arguments.
//!
//! Values:
//! - strings: `"double"` or `'single'` quoted, with `\\`, `\"`, `\'`, `\n` and `\t` escapes
//! - integers: `42`, `-1`
//! - `True`, `False`, `None`
//! - lists: `[1, "1+"]`
//! - dicts: `{"name": "frontend"}`
//! - matchers: `overlay.all`, `overlay.index(0)`, `overlay.map_key("name")`,
//!   `overlay.subset({...})`, `overlay.not_op(m)`, `overlay.and_op(m, ...)`, `overlay.or_op(m, ...)`
use super::{Annotation, ArgValue};
use crate::position::Position;
use crate::predicate::{self, Predicate};

#[derive(thiserror::Error, Debug, Clone, PartialEq, derive_new::new)]
#[error("{position}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub position: Position,
}

/// Parses the text following `#@`
pub fn parse(text: &str, position: &Position) -> Result<(String, Annotation), SyntaxError> {
    let mut cursor = Cursor {
        src: text,
        offset: 0,
        position,
    };

    let name = cursor.take_while(|c| !c.is_whitespace());
    if name.is_empty() {
        return Err(cursor.error("missing annotation name after '#@'"));
    }
    let name = name.to_string();

    let mut annotation = Annotation::new(vec![], vec![], position.clone());

    cursor.skip_whitespace();
    while !cursor.at_end() {
        match cursor.keyword()? {
            Some(keyword) => {
                let value = cursor.value()?;
                annotation.kwargs.push((keyword, value));
            }
            None if annotation.kwargs.is_empty() => annotation.args.push(cursor.value()?),
            None => return Err(cursor.error("positional argument follows keyword argument")),
        }

        cursor.skip_whitespace();
        if cursor.eat(',') {
            cursor.skip_whitespace();
        } else if !cursor.at_end() {
            return Err(cursor.error("expected ',' between arguments"));
        }
    }

    tracing::trace!(%name, ?annotation, "parsed annotation");
    Ok((name, annotation))
}

struct Cursor<'a> {
    src: &'a str,
    offset: usize,
    position: &'a Position,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.offset >= self.src.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.offset += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SyntaxError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c| !predicate(c)).unwrap_or(rest.len());
        self.offset += len;
        &rest[..len]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn error(&self, message: &str) -> SyntaxError {
        SyntaxError::new(
            format!("{message} (at column {} of '{}')", self.offset + 1, self.src),
            self.position.clone(),
        )
    }

    /// Consumes `<ident>=` if present
    fn keyword(&mut self) -> Result<Option<String>, SyntaxError> {
        let start = self.offset;
        let ident = self.take_while(is_ident_char);
        self.skip_whitespace();

        if !ident.is_empty() && self.peek() == Some('=') {
            self.bump();
            self.skip_whitespace();
            return Ok(Some(ident.to_string()));
        }

        self.offset = start;
        Ok(None)
    }

    fn value(&mut self) -> Result<ArgValue, SyntaxError> {
        self.skip_whitespace();
        let value = match self.peek() {
            Some('"') | Some('\'') => ArgValue::String(self.string()?),
            Some('[') => {
                self.bump();
                ArgValue::List(self.sequence(']')?)
            }
            Some('{') => self.dict()?,
            Some(c) if c == '-' || c.is_ascii_digit() => self.int()?,
            Some(c) if is_ident_char(c) => self.identifier()?,
            Some(c) => return Err(self.error(&format!("unexpected character '{c}'"))),
            None => return Err(self.error("expected a value")),
        };
        self.skip_whitespace();
        Ok(value)
    }

    /// Values up to `close`; the opening bracket was consumed
    fn sequence(&mut self, close: char) -> Result<Vec<ArgValue>, SyntaxError> {
        let mut values = vec![];
        loop {
            self.skip_whitespace();
            if self.eat(close) {
                return Ok(values);
            }
            values.push(self.value()?);
            if !self.eat(',') {
                self.skip_whitespace();
                self.expect(close)?;
                return Ok(values);
            }
        }
    }

    fn dict(&mut self) -> Result<ArgValue, SyntaxError> {
        self.expect('{')?;
        let mut entries = vec![];
        loop {
            self.skip_whitespace();
            if self.eat('}') {
                return Ok(ArgValue::Dict(entries));
            }
            let key = self.value()?;
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));
            if !self.eat(',') {
                self.expect('}')?;
                return Ok(ArgValue::Dict(entries));
            }
        }
    }

    fn string(&mut self) -> Result<String, SyntaxError> {
        let quote = self.bump().unwrap_or('"');
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                    _ => return Err(self.error("invalid escape sequence")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn int(&mut self) -> Result<ArgValue, SyntaxError> {
        let start = self.offset;
        self.eat('-');
        self.take_while(|c| c.is_ascii_digit());
        self.src[start..self.offset]
            .parse()
            .map(ArgValue::Int)
            .map_err(|_| self.error("invalid integer"))
    }

    fn identifier(&mut self) -> Result<ArgValue, SyntaxError> {
        let ident = self.take_while(|c| is_ident_char(c) || c == '.');
        match ident {
            "True" => return Ok(ArgValue::Bool(true)),
            "False" => return Ok(ArgValue::Bool(false)),
            "None" => return Ok(ArgValue::None),
            _ => {}
        }

        let args = if self.eat('(') {
            self.sequence(')')?
        } else {
            vec![]
        };

        self.matcher(ident, args).map(ArgValue::Predicate)
    }

    fn matcher(&self, function: &str, args: Vec<ArgValue>) -> Result<Predicate, SyntaxError> {
        let arity = |expected: usize| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(self.error(&format!(
                    "'{function}' expects {expected} argument(s), got {}",
                    args.len()
                )))
            }
        };

        match function {
            "overlay.all" => {
                arity(0)?;
                Ok(predicate::all())
            }
            "overlay.index" => {
                arity(1)?;
                match &args[0] {
                    ArgValue::Int(i) if *i >= 0 => Ok(predicate::index(*i as usize)),
                    _ => Err(self.error("'overlay.index' expects a non-negative integer")),
                }
            }
            "overlay.map_key" => {
                arity(1)?;
                match &args[0] {
                    ArgValue::String(key) => Ok(predicate::map_key(key.as_str())),
                    _ => Err(self.error("'overlay.map_key' expects a string")),
                }
            }
            "overlay.subset" => {
                arity(1)?;
                args[0]
                    .to_fragment()
                    .map(predicate::subset)
                    .ok_or_else(|| self.error("'overlay.subset' expects data, not a function"))
            }
            "overlay.not_op" => {
                arity(1)?;
                let mut predicates = self.predicates(function, args)?;
                Ok(predicate::not(predicates.remove(0)))
            }
            "overlay.and_op" => Ok(predicate::and(self.predicates(function, args)?)),
            "overlay.or_op" => Ok(predicate::or(self.predicates(function, args)?)),
            _ => Err(self.error(&format!("unknown value or function '{function}'"))),
        }
    }

    fn predicates(&self, function: &str, args: Vec<ArgValue>) -> Result<Vec<Predicate>, SyntaxError> {
        args.into_iter()
            .map(|arg| match arg {
                ArgValue::Predicate(predicate) => Ok(predicate),
                other => Err(self.error(&format!(
                    "'{function}' expects functions, got {}",
                    other.type_name()
                ))),
            })
            .collect()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Fragment;
    use crate::{fragment_map, predicate::EvalError};
    use pretty_assertions::assert_eq;

    fn parse_ok(text: &str) -> (String, Annotation) {
        parse(text, &Position::unknown()).expect("annotation must parse")
    }

    #[test]
    fn name_only() {
        let (name, annotation) = parse_ok("overlay/remove");
        assert_eq!(name, "overlay/remove");
        assert!(annotation.args.is_empty());
        assert!(annotation.kwargs.is_empty());
    }

    #[test]
    fn keyword_arguments() {
        let (name, annotation) =
            parse_ok(r#"overlay/match by="name", missing_ok=True, expects=[0, "2+"]"#);
        assert_eq!(name, "overlay/match");

        let keywords: Vec<_> = annotation.kwargs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keywords, vec!["by", "missing_ok", "expects"]);

        assert!(matches!(&annotation.kwargs[0].1, ArgValue::String(s) if s == "name"));
        assert!(matches!(annotation.kwargs[1].1, ArgValue::Bool(true)));
        assert_eq!(
            annotation.kwargs[2].1.to_fragment(),
            Some(crate::fragment_array![0, "2+"])
        );
    }

    #[test]
    fn matcher_calls() {
        let (_, annotation) = parse_ok(r#"overlay/match by=overlay.map_key('name')"#);
        let ArgValue::Predicate(predicate) = &annotation.kwargs[0].1 else {
            panic!("expected a predicate");
        };

        let base = fragment_map! {"name" => "a"};
        assert_eq!(predicate.call(0, &base, &base), Ok(true));
        assert_eq!(
            predicate.call(0, &Fragment::from(1), &base),
            Err(EvalError::NotAMap("int"))
        );
    }

    #[test]
    fn nested_matchers() {
        let (_, annotation) = parse_ok(
            r#"overlay/match by=overlay.or_op(overlay.index(1), overlay.subset({"kind": "Service"}))"#,
        );
        let ArgValue::Predicate(predicate) = &annotation.kwargs[0].1 else {
            panic!("expected a predicate");
        };

        let service = fragment_map! {"kind" => "Service"};
        let deployment = fragment_map! {"kind" => "Deployment"};
        assert_eq!(predicate.call(0, &service, &service), Ok(true));
        assert_eq!(predicate.call(1, &deployment, &service), Ok(true));
        assert_eq!(predicate.call(2, &deployment, &service), Ok(false));
    }

    #[test]
    fn positional_arguments() {
        let (_, annotation) = parse_ok(r#"example 1, 'two', by=overlay.all"#);
        assert_eq!(annotation.args.len(), 2);
        assert_eq!(annotation.kwargs.len(), 1);
    }

    #[test]
    fn errors() {
        let position = Position::new(Some("overlay.yml".into()), 7);
        for text in [
            "",
            " overlay/match",
            "overlay/match by=",
            "overlay/match by=\"open",
            "overlay/match by=overlay.nope",
            "overlay/match by=overlay.index(\"x\")",
            "overlay/match by=overlay.all expects=1",
            "overlay/match by=overlay.all, 1",
        ] {
            let err = parse(text, &position).expect_err(text);
            assert_eq!(err.position, position);
            assert!(err.to_string().starts_with("overlay.yml:7: "), "{err}");
        }
    }
}
