//! S-expression format for syntax trees
//!
//! ```text
//! (class (const nil :Greeter) nil
//!   (def :greet (args :name)
//!     (send nil :puts (lvar :name))))
//! ```
//!
//! `nil` as a bare word marks an absent child; `(nil)` is the nil literal.
//! A file holding several top-level forms reads as one `begin` node.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::Parser;
use crate::error::{MutantError, Result};
use crate::node::{Node, NodeRef};

/// Error produced while reading S-expressions
#[derive(Debug, Error, PartialEq)]
#[error("{message} at byte {position}")]
pub struct ReadError {
    pub message: String,
    pub position: usize,
}

/// Parser for `.sexp` source files
#[derive(Debug, Default, Clone, Copy)]
pub struct SexpParser;

impl Parser for SexpParser {
    fn parse(&self, path: &Path) -> Result<NodeRef> {
        let source = std::fs::read_to_string(path).map_err(|e| MutantError::FileReadError {
            file: path.to_path_buf(),
            error: e.to_string(),
        })?;
        read(&source).map_err(|e| MutantError::ParseError {
            file: path.to_path_buf(),
            error: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Datum {
    List(Vec<Datum>, usize),
    Word(String, usize),
    Symbol(String, usize),
    Integer(i64, usize),
    Str(String, usize),
}

impl Datum {
    fn position(&self) -> usize {
        match self {
            Datum::List(_, position)
            | Datum::Word(_, position)
            | Datum::Symbol(_, position)
            | Datum::Integer(_, position)
            | Datum::Str(_, position) => *position,
        }
    }
}

/// Read all top-level forms of `source` into one tree
pub fn read(source: &str) -> std::result::Result<NodeRef, ReadError> {
    let mut reader = Reader {
        source,
        position: 0,
    };
    let mut forms = Vec::new();
    while let Some(datum) = reader.datum()? {
        forms.push(node(&datum)?);
    }
    if forms.len() == 1 {
        Ok(forms.remove(0))
    } else {
        Ok(Arc::new(Node::Begin(forms)))
    }
}

/// Write a tree as a single-line S-expression
pub fn write(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node);
    out
}

struct Reader<'a> {
    source: &'a str,
    position: usize,
}

impl Reader<'_> {
    fn error(&self, message: impl Into<String>) -> ReadError {
        ReadError {
            message: message.into(),
            position: self.position,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c == ';' {
                while !matches!(self.bump(), Some('\n') | None) {}
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn atom_text(&mut self) -> &str {
        let start = self.position;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '(' || c == ')' || c == ';' {
                break;
            }
            self.bump();
        }
        &self.source[start..self.position]
    }

    /// Body of a `\u{...}` escape, after the `u`
    fn unicode_escape(&mut self) -> std::result::Result<char, ReadError> {
        if self.bump() != Some('{') {
            return Err(self.error("expected '{' in unicode escape"));
        }
        let mut digits = String::new();
        loop {
            match self.bump() {
                Some('}') => break,
                Some(c) if c.is_ascii_hexdigit() && digits.len() < 6 => digits.push(c),
                _ => return Err(self.error("invalid unicode escape")),
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("invalid unicode escape"))
    }

    fn datum(&mut self) -> std::result::Result<Option<Datum>, ReadError> {
        self.skip_trivia();
        let start = self.position;
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let datum = match c {
            '(' => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_trivia();
                    match self.peek() {
                        Some(')') => {
                            self.bump();
                            break;
                        }
                        Some(_) => match self.datum()? {
                            Some(item) => items.push(item),
                            None => return Err(self.error("unterminated list")),
                        },
                        None => return Err(self.error("unterminated list")),
                    }
                }
                Datum::List(items, start)
            }
            ')' => return Err(self.error("unexpected ')'")),
            '"' => {
                self.bump();
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some('"') => break,
                        Some('\\') => match self.bump() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some('r') => value.push('\r'),
                            Some('0') => value.push('\0'),
                            Some('u') => value.push(self.unicode_escape()?),
                            Some(other) => value.push(other),
                            None => return Err(self.error("unterminated string")),
                        },
                        Some(other) => value.push(other),
                        None => return Err(self.error("unterminated string")),
                    }
                }
                Datum::Str(value, start)
            }
            ':' => {
                self.bump();
                let name = self.atom_text().to_string();
                if name.is_empty() {
                    return Err(self.error("empty symbol"));
                }
                Datum::Symbol(name, start)
            }
            _ => {
                let text = self.atom_text().to_string();
                match text.parse::<i64>() {
                    Ok(value) => Datum::Integer(value, start),
                    Err(_) => Datum::Word(text, start),
                }
            }
        };
        Ok(Some(datum))
    }
}

fn error_at(datum: &Datum, message: impl Into<String>) -> ReadError {
    ReadError {
        message: message.into(),
        position: datum.position(),
    }
}

fn node(datum: &Datum) -> std::result::Result<NodeRef, ReadError> {
    optional_node(datum)?.ok_or_else(|| error_at(datum, "expected a node, found nil"))
}

fn optional_node(datum: &Datum) -> std::result::Result<Option<NodeRef>, ReadError> {
    let (items, position) = match datum {
        Datum::Word(word, _) if word == "nil" => return Ok(None),
        Datum::List(items, position) => (items, *position),
        other => return Err(error_at(other, "expected a node")),
    };
    let Some(Datum::Word(tag, _)) = items.first() else {
        return Err(error_at(datum, "expected a node tag"));
    };
    let args = Args {
        items: &items[1..],
        position,
        tag: tag.as_str(),
    };

    let node = match tag.as_str() {
        "nil" => args.arity(0).map(|_| Node::Nil)?,
        "true" => args.arity(0).map(|_| Node::True)?,
        "false" => args.arity(0).map(|_| Node::False)?,
        "self" => args.arity(0).map(|_| Node::SelfRef)?,
        "int" => {
            args.arity(1)?;
            match &args.items[0] {
                Datum::Integer(value, _) => Node::Int(*value),
                other => return Err(error_at(other, "expected an integer")),
            }
        }
        "str" => {
            args.arity(1)?;
            match &args.items[0] {
                Datum::Str(value, _) => Node::Str(value.clone()),
                other => return Err(error_at(other, "expected a string")),
            }
        }
        "sym" => Node::Sym(args.single_symbol()?),
        "lvar" => Node::Lvar(args.single_symbol()?),
        "ivar" => Node::Ivar(args.single_symbol()?),
        "const" => {
            args.arity(2)?;
            Node::Const {
                scope: optional_node(&args.items[0])?,
                name: symbol(&args.items[1])?,
            }
        }
        "lvasgn" | "ivasgn" => {
            let name = symbol(args.items.first().ok_or_else(|| args.error())?)?;
            let value = match args.items {
                [_] => None,
                [_, value] => Some(node(value)?),
                _ => return Err(args.error()),
            };
            if tag == "lvasgn" {
                Node::Lvasgn { name, value }
            } else {
                Node::Ivasgn { name, value }
            }
        }
        "or_asgn" | "and_asgn" => {
            args.arity(2)?;
            let target = node(&args.items[0])?;
            let value = node(&args.items[1])?;
            if tag == "or_asgn" {
                Node::OrAsgn { target, value }
            } else {
                Node::AndAsgn { target, value }
            }
        }
        "op_asgn" => {
            args.arity(3)?;
            Node::OpAsgn {
                target: node(&args.items[0])?,
                operator: symbol(&args.items[1])?,
                value: node(&args.items[2])?,
            }
        }
        "send" => {
            if args.items.len() < 2 {
                return Err(args.error());
            }
            Node::Send {
                receiver: optional_node(&args.items[0])?,
                selector: symbol(&args.items[1])?,
                arguments: nodes(&args.items[2..])?,
            }
        }
        "and" | "or" => {
            args.arity(2)?;
            let left = node(&args.items[0])?;
            let right = node(&args.items[1])?;
            if tag == "and" {
                Node::And { left, right }
            } else {
                Node::Or { left, right }
            }
        }
        "if" => {
            args.arity(3)?;
            Node::If {
                condition: node(&args.items[0])?,
                if_branch: optional_node(&args.items[1])?,
                else_branch: optional_node(&args.items[2])?,
            }
        }
        "begin" => Node::Begin(nodes(args.items)?),
        "array" => Node::Array(nodes(args.items)?),
        "return" => match args.items {
            [] => Node::Return(None),
            [value] => Node::Return(Some(node(value)?)),
            _ => return Err(args.error()),
        },
        "block" => {
            args.arity(3)?;
            Node::Block {
                call: node(&args.items[0])?,
                arguments: arguments(&args.items[1])?,
                body: optional_node(&args.items[2])?,
            }
        }
        "def" => {
            args.arity(3)?;
            Node::Def {
                name: symbol(&args.items[0])?,
                arguments: arguments(&args.items[1])?,
                body: optional_node(&args.items[2])?,
            }
        }
        "defs" => {
            args.arity(4)?;
            Node::Defs {
                singleton: node(&args.items[0])?,
                name: symbol(&args.items[1])?,
                arguments: arguments(&args.items[2])?,
                body: optional_node(&args.items[3])?,
            }
        }
        "module" => {
            args.arity(2)?;
            Node::Module {
                name: node(&args.items[0])?,
                body: optional_node(&args.items[1])?,
            }
        }
        "class" => {
            args.arity(3)?;
            Node::Class {
                name: node(&args.items[0])?,
                superclass: optional_node(&args.items[1])?,
                body: optional_node(&args.items[2])?,
            }
        }
        other => return Err(error_at(datum, format!("unknown node type '{}'", other))),
    };
    Ok(Some(Arc::new(node)))
}

struct Args<'a> {
    items: &'a [Datum],
    position: usize,
    tag: &'a str,
}

impl Args<'_> {
    fn error(&self) -> ReadError {
        ReadError {
            message: format!("wrong number of children for '{}'", self.tag),
            position: self.position,
        }
    }

    fn arity(&self, expected: usize) -> std::result::Result<(), ReadError> {
        if self.items.len() == expected {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn single_symbol(&self) -> std::result::Result<String, ReadError> {
        self.arity(1)?;
        symbol(&self.items[0])
    }
}

fn symbol(datum: &Datum) -> std::result::Result<String, ReadError> {
    match datum {
        Datum::Symbol(name, _) => Ok(name.clone()),
        other => Err(error_at(other, "expected a symbol")),
    }
}

fn nodes(items: &[Datum]) -> std::result::Result<Vec<NodeRef>, ReadError> {
    items.iter().map(node).collect()
}

fn arguments(datum: &Datum) -> std::result::Result<Vec<String>, ReadError> {
    match datum {
        Datum::List(items, _) if matches!(items.first(), Some(Datum::Word(tag, _)) if tag == "args") => {
            items[1..].iter().map(symbol).collect()
        }
        other => Err(error_at(other, "expected (args ...)")),
    }
}

fn write_optional(out: &mut String, node: &Option<NodeRef>) {
    match node {
        Some(node) => write_node(out, node),
        None => out.push_str(" nil"),
    }
}

fn write_arguments(out: &mut String, arguments: &[String]) {
    out.push_str(" (args");
    for argument in arguments {
        let _ = write!(out, " :{}", argument);
    }
    out.push(')');
}

/// Quoted string using only the escapes the reader decodes
fn write_string(out: &mut String, value: &str) {
    out.push_str(" \"");
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_node(out: &mut String, node: &Node) {
    if !out.is_empty() {
        out.push(' ');
    }
    let _ = write!(out, "({}", node.kind());
    match node {
        Node::Nil | Node::True | Node::False | Node::SelfRef => {}
        Node::Int(value) => {
            let _ = write!(out, " {}", value);
        }
        Node::Str(value) => write_string(out, value),
        Node::Sym(name) | Node::Lvar(name) | Node::Ivar(name) => {
            let _ = write!(out, " :{}", name);
        }
        Node::Const { scope, name } => {
            write_optional(out, scope);
            let _ = write!(out, " :{}", name);
        }
        Node::Lvasgn { name, value } | Node::Ivasgn { name, value } => {
            let _ = write!(out, " :{}", name);
            if let Some(value) = value {
                write_node(out, value);
            }
        }
        Node::OrAsgn { target, value } | Node::AndAsgn { target, value } => {
            write_node(out, target);
            write_node(out, value);
        }
        Node::OpAsgn {
            target,
            operator,
            value,
        } => {
            write_node(out, target);
            let _ = write!(out, " :{}", operator);
            write_node(out, value);
        }
        Node::Send {
            receiver,
            selector,
            arguments,
        } => {
            write_optional(out, receiver);
            let _ = write!(out, " :{}", selector);
            for argument in arguments {
                write_node(out, argument);
            }
        }
        Node::And { left, right } | Node::Or { left, right } => {
            write_node(out, left);
            write_node(out, right);
        }
        Node::If {
            condition,
            if_branch,
            else_branch,
        } => {
            write_node(out, condition);
            write_optional(out, if_branch);
            write_optional(out, else_branch);
        }
        Node::Begin(children) | Node::Array(children) => {
            for child in children {
                write_node(out, child);
            }
        }
        Node::Return(value) => {
            if let Some(value) = value {
                write_node(out, value);
            }
        }
        Node::Block {
            call,
            arguments,
            body,
        } => {
            write_node(out, call);
            write_arguments(out, arguments);
            write_optional(out, body);
        }
        Node::Def {
            name,
            arguments,
            body,
        } => {
            let _ = write!(out, " :{}", name);
            write_arguments(out, arguments);
            write_optional(out, body);
        }
        Node::Defs {
            singleton,
            name,
            arguments,
            body,
        } => {
            write_node(out, singleton);
            let _ = write!(out, " :{}", name);
            write_arguments(out, arguments);
            write_optional(out, body);
        }
        Node::Module { name, body } => {
            write_node(out, name);
            write_optional(out, body);
        }
        Node::Class {
            name,
            superclass,
            body,
        } => {
            write_node(out, name);
            write_optional(out, superclass);
            write_optional(out, body);
        }
    }
    out.push(')');
}
