//! Syntax tree model
//!
//! Nodes are immutable. Children are held behind [`Arc`], so a rewritten tree
//! shares every subtree it did not touch with the tree it was derived from.
//! Equality and hashing are structural.

use std::fmt;
use std::sync::Arc;

/// Shared handle to a syntax node
pub type NodeRef = Arc<Node>;

/// A syntax tree node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Nil,
    True,
    False,
    SelfRef,
    Int(i64),
    Str(String),
    Sym(String),
    Lvar(String),
    Ivar(String),
    Const {
        scope: Option<NodeRef>,
        name: String,
    },
    Lvasgn {
        name: String,
        value: Option<NodeRef>,
    },
    Ivasgn {
        name: String,
        value: Option<NodeRef>,
    },
    OrAsgn {
        target: NodeRef,
        value: NodeRef,
    },
    AndAsgn {
        target: NodeRef,
        value: NodeRef,
    },
    OpAsgn {
        target: NodeRef,
        operator: String,
        value: NodeRef,
    },
    Send {
        receiver: Option<NodeRef>,
        selector: String,
        arguments: Vec<NodeRef>,
    },
    And {
        left: NodeRef,
        right: NodeRef,
    },
    Or {
        left: NodeRef,
        right: NodeRef,
    },
    If {
        condition: NodeRef,
        if_branch: Option<NodeRef>,
        else_branch: Option<NodeRef>,
    },
    Begin(Vec<NodeRef>),
    Array(Vec<NodeRef>),
    Return(Option<NodeRef>),
    Block {
        call: NodeRef,
        arguments: Vec<String>,
        body: Option<NodeRef>,
    },
    Def {
        name: String,
        arguments: Vec<String>,
        body: Option<NodeRef>,
    },
    Defs {
        singleton: NodeRef,
        name: String,
        arguments: Vec<String>,
        body: Option<NodeRef>,
    },
    Module {
        name: NodeRef,
        body: Option<NodeRef>,
    },
    Class {
        name: NodeRef,
        superclass: Option<NodeRef>,
        body: Option<NodeRef>,
    },
}

/// Kind tag of a [`Node`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Nil,
    True,
    False,
    SelfRef,
    Int,
    Str,
    Sym,
    Lvar,
    Ivar,
    Const,
    Lvasgn,
    Ivasgn,
    OrAsgn,
    AndAsgn,
    OpAsgn,
    Send,
    And,
    Or,
    If,
    Begin,
    Array,
    Return,
    Block,
    Def,
    Defs,
    Module,
    Class,
}

impl NodeKind {
    /// Tag used by the S-expression format
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Nil => "nil",
            NodeKind::True => "true",
            NodeKind::False => "false",
            NodeKind::SelfRef => "self",
            NodeKind::Int => "int",
            NodeKind::Str => "str",
            NodeKind::Sym => "sym",
            NodeKind::Lvar => "lvar",
            NodeKind::Ivar => "ivar",
            NodeKind::Const => "const",
            NodeKind::Lvasgn => "lvasgn",
            NodeKind::Ivasgn => "ivasgn",
            NodeKind::OrAsgn => "or_asgn",
            NodeKind::AndAsgn => "and_asgn",
            NodeKind::OpAsgn => "op_asgn",
            NodeKind::Send => "send",
            NodeKind::And => "and",
            NodeKind::Or => "or",
            NodeKind::If => "if",
            NodeKind::Begin => "begin",
            NodeKind::Array => "array",
            NodeKind::Return => "return",
            NodeKind::Block => "block",
            NodeKind::Def => "def",
            NodeKind::Defs => "defs",
            NodeKind::Module => "module",
            NodeKind::Class => "class",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Nil => NodeKind::Nil,
            Node::True => NodeKind::True,
            Node::False => NodeKind::False,
            Node::SelfRef => NodeKind::SelfRef,
            Node::Int(_) => NodeKind::Int,
            Node::Str(_) => NodeKind::Str,
            Node::Sym(_) => NodeKind::Sym,
            Node::Lvar(_) => NodeKind::Lvar,
            Node::Ivar(_) => NodeKind::Ivar,
            Node::Const { .. } => NodeKind::Const,
            Node::Lvasgn { .. } => NodeKind::Lvasgn,
            Node::Ivasgn { .. } => NodeKind::Ivasgn,
            Node::OrAsgn { .. } => NodeKind::OrAsgn,
            Node::AndAsgn { .. } => NodeKind::AndAsgn,
            Node::OpAsgn { .. } => NodeKind::OpAsgn,
            Node::Send { .. } => NodeKind::Send,
            Node::And { .. } => NodeKind::And,
            Node::Or { .. } => NodeKind::Or,
            Node::If { .. } => NodeKind::If,
            Node::Begin(_) => NodeKind::Begin,
            Node::Array(_) => NodeKind::Array,
            Node::Return(_) => NodeKind::Return,
            Node::Block { .. } => NodeKind::Block,
            Node::Def { .. } => NodeKind::Def,
            Node::Defs { .. } => NodeKind::Defs,
            Node::Module { .. } => NodeKind::Module,
            Node::Class { .. } => NodeKind::Class,
        }
    }

    /// Present child nodes, in source order
    pub fn children(&self) -> Vec<&NodeRef> {
        match self {
            Node::Nil
            | Node::True
            | Node::False
            | Node::SelfRef
            | Node::Int(_)
            | Node::Str(_)
            | Node::Sym(_)
            | Node::Lvar(_)
            | Node::Ivar(_) => Vec::new(),
            Node::Const { scope, .. } => scope.iter().collect(),
            Node::Lvasgn { value, .. } | Node::Ivasgn { value, .. } => value.iter().collect(),
            Node::OrAsgn { target, value }
            | Node::AndAsgn { target, value }
            | Node::OpAsgn { target, value, .. } => vec![target, value],
            Node::Send {
                receiver,
                arguments,
                ..
            } => receiver.iter().chain(arguments.iter()).collect(),
            Node::And { left, right } | Node::Or { left, right } => vec![left, right],
            Node::If {
                condition,
                if_branch,
                else_branch,
            } => std::iter::once(condition)
                .chain(if_branch.iter())
                .chain(else_branch.iter())
                .collect(),
            Node::Begin(children) | Node::Array(children) => children.iter().collect(),
            Node::Return(value) => value.iter().collect(),
            Node::Block { call, body, .. } => std::iter::once(call).chain(body.iter()).collect(),
            Node::Def { body, .. } => body.iter().collect(),
            Node::Defs {
                singleton, body, ..
            } => std::iter::once(singleton).chain(body.iter()).collect(),
            Node::Module { name, body } => std::iter::once(name).chain(body.iter()).collect(),
            Node::Class {
                name,
                superclass,
                body,
            } => std::iter::once(name)
                .chain(superclass.iter())
                .chain(body.iter())
                .collect(),
        }
    }

    /// Rebuild this node with the child at `index` replaced
    ///
    /// `index` counts present children as listed by [`Node::children`].
    /// Returns `None` when there is no such child.
    pub fn replace_child(&self, index: usize, replacement: NodeRef) -> Option<Node> {
        let mut children: Vec<NodeRef> = self.children().into_iter().cloned().collect();
        *children.get_mut(index)? = replacement;
        Some(self.with_children(children))
    }

    /// Rebuild this node with its present children taken from `children`
    ///
    /// Slots without a supplied replacement keep their current child.
    fn with_children(&self, children: Vec<NodeRef>) -> Node {
        let mut supplied = children.into_iter();
        let mut next = |current: &NodeRef| supplied.next().unwrap_or_else(|| Arc::clone(current));

        match self {
            Node::Nil
            | Node::True
            | Node::False
            | Node::SelfRef
            | Node::Int(_)
            | Node::Str(_)
            | Node::Sym(_)
            | Node::Lvar(_)
            | Node::Ivar(_) => self.clone(),
            Node::Const { scope, name } => Node::Const {
                scope: scope.as_ref().map(&mut next),
                name: name.clone(),
            },
            Node::Lvasgn { name, value } => Node::Lvasgn {
                name: name.clone(),
                value: value.as_ref().map(&mut next),
            },
            Node::Ivasgn { name, value } => Node::Ivasgn {
                name: name.clone(),
                value: value.as_ref().map(&mut next),
            },
            Node::OrAsgn { target, value } => Node::OrAsgn {
                target: next(target),
                value: next(value),
            },
            Node::AndAsgn { target, value } => Node::AndAsgn {
                target: next(target),
                value: next(value),
            },
            Node::OpAsgn {
                target,
                operator,
                value,
            } => Node::OpAsgn {
                target: next(target),
                operator: operator.clone(),
                value: next(value),
            },
            Node::Send {
                receiver,
                selector,
                arguments,
            } => Node::Send {
                receiver: receiver.as_ref().map(&mut next),
                selector: selector.clone(),
                arguments: arguments.iter().map(&mut next).collect(),
            },
            Node::And { left, right } => Node::And {
                left: next(left),
                right: next(right),
            },
            Node::Or { left, right } => Node::Or {
                left: next(left),
                right: next(right),
            },
            Node::If {
                condition,
                if_branch,
                else_branch,
            } => Node::If {
                condition: next(condition),
                if_branch: if_branch.as_ref().map(&mut next),
                else_branch: else_branch.as_ref().map(&mut next),
            },
            Node::Begin(children) => Node::Begin(children.iter().map(&mut next).collect()),
            Node::Array(children) => Node::Array(children.iter().map(&mut next).collect()),
            Node::Return(value) => Node::Return(value.as_ref().map(&mut next)),
            Node::Block {
                call,
                arguments,
                body,
            } => Node::Block {
                call: next(call),
                arguments: arguments.clone(),
                body: body.as_ref().map(&mut next),
            },
            Node::Def {
                name,
                arguments,
                body,
            } => Node::Def {
                name: name.clone(),
                arguments: arguments.clone(),
                body: body.as_ref().map(&mut next),
            },
            Node::Defs {
                singleton,
                name,
                arguments,
                body,
            } => Node::Defs {
                singleton: next(singleton),
                name: name.clone(),
                arguments: arguments.clone(),
                body: body.as_ref().map(&mut next),
            },
            Node::Module { name, body } => Node::Module {
                name: next(name),
                body: body.as_ref().map(&mut next),
            },
            Node::Class {
                name,
                superclass,
                body,
            } => Node::Class {
                name: next(name),
                superclass: superclass.as_ref().map(&mut next),
                body: body.as_ref().map(&mut next),
            },
        }
    }

    /// Node reached by following child indices from this node
    pub fn descendant(&self, path: &[usize]) -> Option<&Node> {
        let mut node = self;
        for &index in path {
            node = node.children().get(index).copied()?.as_ref();
        }
        Some(node)
    }

    /// Rebuild this tree with the node at `path` replaced
    pub fn replace_descendant(&self, path: &[usize], replacement: NodeRef) -> Option<Node> {
        match path.split_first() {
            None => Some(Node::clone(&replacement)),
            Some((&index, rest)) => {
                let child = self.children().get(index).copied()?;
                let rebuilt = child.replace_descendant(rest, replacement)?;
                self.replace_child(index, Arc::new(rebuilt))
            }
        }
    }

    /// Fully qualified name of a `const` node (`Foo::Bar`)
    pub fn const_name(&self) -> Option<String> {
        match self {
            Node::Const { scope: None, name } => Some(name.clone()),
            Node::Const {
                scope: Some(scope),
                name,
            } => Some(format!("{}::{}", scope.const_name()?, name)),
            _ => None,
        }
    }
}

/// Shorthand constructors, mostly used by the reader and the mutator
impl Node {
    pub fn int(value: i64) -> NodeRef {
        Arc::new(Node::Int(value))
    }

    pub fn nil() -> NodeRef {
        Arc::new(Node::Nil)
    }

    pub fn lvar(name: &str) -> NodeRef {
        Arc::new(Node::Lvar(name.to_string()))
    }

    pub fn send(receiver: Option<NodeRef>, selector: &str, arguments: Vec<NodeRef>) -> NodeRef {
        Arc::new(Node::Send {
            receiver,
            selector: selector.to_string(),
            arguments,
        })
    }

    pub fn constant(name: &str) -> NodeRef {
        name.split("::").fold(None, |scope, segment| {
            Some(Arc::new(Node::Const {
                scope,
                name: segment.to_string(),
            }))
        })
        .unwrap_or_else(Node::nil)
    }
}

/// Selectors of binary operator methods (`a + b`)
pub const BINARY_METHOD_OPERATORS: &[&str] = &[
    "<=>", "===", "==", "!=", "=~", "!~", "<=", ">=", "<", ">", "<<", ">>", "**", "*", "/", "%",
    "+", "-", "&", "|", "^",
];

/// Selectors of all operator methods, unary and binary
pub const METHOD_OPERATORS: &[&str] = &[
    "<=>", "===", "[]=", "[]", "<=", ">=", "==", "!~", "!=", "=~", "<<", ">>", "**", "*", "%",
    "/", "|", "^", "&", "<", ">", "+", "-", "~", "!", "+@", "-@",
];

/// Reserved words that cannot be sent without an explicit receiver
pub const KEYWORDS: &[&str] = &[
    "alias", "and", "begin", "BEGIN", "break", "case", "class", "def", "defined?", "do", "else",
    "elsif", "end", "END", "ensure", "false", "for", "if", "in", "module", "next", "nil", "not",
    "or", "redo", "rescue", "retry", "return", "self", "super", "then", "true", "undef",
    "unless", "until", "when", "while", "yield", "__FILE__", "__LINE__", "__ENCODING__",
];

pub fn is_binary_operator(selector: &str) -> bool {
    BINARY_METHOD_OPERATORS.contains(&selector)
}

pub fn is_method_operator(selector: &str) -> bool {
    METHOD_OPERATORS.contains(&selector)
}

pub fn is_keyword(selector: &str) -> bool {
    KEYWORDS.contains(&selector)
}

/// `recv.name = value` style setter, excluding comparison operators
pub fn is_attribute_assignment(node: &Node) -> bool {
    match node {
        Node::Send {
            receiver: Some(_),
            selector,
            arguments,
        } => arguments.len() == 1 && selector.ends_with('=') && !is_method_operator(selector),
        _ => false,
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::codegen::generate_source(self))
    }
}
