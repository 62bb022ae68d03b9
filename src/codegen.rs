//! Source generation from syntax trees
//!
//! This module turns (mutated) syntax trees back into readable source for
//! reports and diagnostics.

use crate::node::{is_attribute_assignment, is_binary_operator, Node};

const INDENT: &str = "  ";

/// Generate source code from a syntax tree
pub fn generate_source(node: &Node) -> String {
    let mut printer = Printer::default();
    printer.statement(node);
    printer.lines.join("\n")
}

/// Generate source on a single line, statements separated by `; `
pub fn generate_inline(node: &Node) -> String {
    let mut printer = Printer::default();
    printer.statement(node);
    printer
        .lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Default)]
struct Printer {
    lines: Vec<String>,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: String) {
        self.lines.push(format!("{}{}", INDENT.repeat(self.depth), text));
    }

    fn body(&mut self, body: Option<&Node>) {
        self.depth += 1;
        if let Some(body) = body {
            self.statement(body);
        }
        self.depth -= 1;
    }

    fn statement(&mut self, node: &Node) {
        match node {
            Node::Begin(statements) if statements.is_empty() => self.line("nil".to_string()),
            Node::Begin(statements) => {
                for statement in statements {
                    self.statement(statement);
                }
            }
            Node::If {
                condition,
                if_branch,
                else_branch,
            } => {
                self.line(format!("if {}", expression(condition)));
                self.body(if_branch.as_deref());
                if let Some(else_branch) = else_branch {
                    self.line("else".to_string());
                    self.body(Some(&**else_branch));
                }
                self.line("end".to_string());
            }
            Node::Block {
                call,
                arguments,
                body,
            } => {
                if arguments.is_empty() {
                    self.line(format!("{} do", expression(call)));
                } else {
                    self.line(format!("{} do |{}|", expression(call), arguments.join(", ")));
                }
                self.body(body.as_deref());
                self.line("end".to_string());
            }
            Node::Def {
                name,
                arguments,
                body,
            } => {
                self.line(format!("def {}{}", name, parameters(arguments)));
                self.body(body.as_deref());
                self.line("end".to_string());
            }
            Node::Defs {
                singleton,
                name,
                arguments,
                body,
            } => {
                self.line(format!(
                    "def {}.{}{}",
                    expression(singleton),
                    name,
                    parameters(arguments)
                ));
                self.body(body.as_deref());
                self.line("end".to_string());
            }
            Node::Module { name, body } => {
                self.line(format!("module {}", expression(name)));
                self.body(body.as_deref());
                self.line("end".to_string());
            }
            Node::Class {
                name,
                superclass,
                body,
            } => match superclass {
                Some(superclass) => {
                    self.line(format!(
                        "class {} < {}",
                        expression(name),
                        expression(superclass)
                    ));
                    self.body(body.as_deref());
                    self.line("end".to_string());
                }
                None => {
                    self.line(format!("class {}", expression(name)));
                    self.body(body.as_deref());
                    self.line("end".to_string());
                }
            },
            _ => self.line(expression(node)),
        }
    }
}

fn parameters(arguments: &[String]) -> String {
    if arguments.is_empty() {
        String::new()
    } else {
        format!("({})", arguments.join(", "))
    }
}

fn list(nodes: &[std::sync::Arc<Node>]) -> String {
    nodes
        .iter()
        .map(|node| expression(node))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a node used as an operand, parenthesizing compound expressions
fn operand(node: &Node) -> String {
    let compound = match node {
        Node::Send {
            receiver: Some(_),
            selector,
            arguments,
        } => arguments.len() == 1 && is_binary_operator(selector),
        Node::And { .. }
        | Node::Or { .. }
        | Node::Lvasgn { value: Some(_), .. }
        | Node::Ivasgn { value: Some(_), .. }
        | Node::OrAsgn { .. }
        | Node::AndAsgn { .. }
        | Node::OpAsgn { .. } => true,
        _ => false,
    };
    if compound {
        format!("({})", expression(node))
    } else {
        expression(node)
    }
}

fn expression(node: &Node) -> String {
    match node {
        Node::Nil => "nil".to_string(),
        Node::True => "true".to_string(),
        Node::False => "false".to_string(),
        Node::SelfRef => "self".to_string(),
        Node::Int(value) => value.to_string(),
        Node::Str(value) => format!("{:?}", value),
        Node::Sym(name) => format!(":{}", name),
        Node::Lvar(name) | Node::Ivar(name) => name.clone(),
        Node::Const { scope, name } => match scope {
            Some(scope) => format!("{}::{}", expression(scope), name),
            None => name.clone(),
        },
        Node::Lvasgn { name, value } | Node::Ivasgn { name, value } => match value {
            Some(value) => format!("{} = {}", name, expression(value)),
            None => name.clone(),
        },
        Node::OrAsgn { target, value } => {
            format!("{} ||= {}", expression(target), expression(value))
        }
        Node::AndAsgn { target, value } => {
            format!("{} &&= {}", expression(target), expression(value))
        }
        Node::OpAsgn {
            target,
            operator,
            value,
        } => format!("{} {}= {}", expression(target), operator, expression(value)),
        Node::Send { .. } => send(node),
        Node::And { left, right } => format!("{} && {}", operand(left), operand(right)),
        Node::Or { left, right } => format!("{} || {}", operand(left), operand(right)),
        Node::Array(elements) => format!("[{}]", list(elements)),
        Node::Return(None) => "return".to_string(),
        Node::Return(Some(value)) => format!("return {}", expression(value)),
        Node::Begin(_)
        | Node::If { .. }
        | Node::Block { .. }
        | Node::Def { .. }
        | Node::Defs { .. }
        | Node::Module { .. }
        | Node::Class { .. } => generate_inline(node),
    }
}

fn send(node: &Node) -> String {
    let Node::Send {
        receiver,
        selector,
        arguments,
    } = node
    else {
        return expression(node);
    };

    if let Some(receiver) = receiver {
        match (selector.as_str(), arguments.as_slice()) {
            ("[]", _) => return format!("{}[{}]", operand(receiver), list(arguments)),
            ("[]=", [index @ .., value]) => {
                return format!(
                    "{}[{}] = {}",
                    operand(receiver),
                    list(index),
                    expression(value)
                )
            }
            ("!" | "~", []) => return format!("{}{}", selector, operand(receiver)),
            ("-@" | "+@", []) => return format!("{}{}", &selector[..1], operand(receiver)),
            (_, [argument]) if is_binary_operator(selector) => {
                return format!("{} {} {}", operand(receiver), selector, operand(argument))
            }
            _ => {}
        }
        if is_attribute_assignment(node) {
            let name = selector.trim_end_matches('=');
            return format!(
                "{}.{} = {}",
                operand(receiver),
                name,
                list(arguments)
            );
        }
    }

    let prefix = receiver
        .as_ref()
        .map(|receiver| format!("{}.", operand(receiver)))
        .unwrap_or_default();
    if arguments.is_empty() {
        format!("{}{}", prefix, selector)
    } else {
        format!("{}{}({})", prefix, selector, list(arguments))
    }
}
