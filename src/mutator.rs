//! Mutation generation
//!
//! [`mutate`] maps one syntax node to the ordered set of its variants. Each
//! composite rule mutates one child position at a time and adds transforms
//! specific to the node kind. Variants equal to the input are dropped, as
//! are repeats of an earlier variant.

mod send;

use std::collections::HashSet;
use std::sync::Arc;

use crate::node::{Node, NodeRef};

/// Position of the node being mutated within its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Default,
    /// Target of `||=`, `&&=` or `op=`
    AssignmentTarget,
}

/// Generate all mutations of `node`, in a deterministic order
pub fn mutate(node: &Node) -> Vec<NodeRef> {
    mutate_in(node, Context::Default)
}

fn mutate_in(node: &Node, context: Context) -> Vec<NodeRef> {
    let mut variants = Variants::new(node);
    emit(node, context, &mut variants);
    variants.into_vec()
}

/// Ordered, deduplicated collection of variants of one input node
struct Variants<'a> {
    input: &'a Node,
    seen: HashSet<NodeRef>,
    output: Vec<NodeRef>,
}

impl<'a> Variants<'a> {
    fn new(input: &'a Node) -> Self {
        Self {
            input,
            seen: HashSet::new(),
            output: Vec::new(),
        }
    }

    fn push(&mut self, variant: NodeRef) {
        if *variant == *self.input || self.seen.contains(&variant) {
            return;
        }
        self.seen.insert(Arc::clone(&variant));
        self.output.push(variant);
    }

    fn node(&mut self, variant: Node) {
        self.push(Arc::new(variant));
    }

    fn singleton(&mut self) {
        self.push(Node::nil());
    }

    fn into_vec(self) -> Vec<NodeRef> {
        self.output
    }
}

fn emit(node: &Node, context: Context, out: &mut Variants<'_>) {
    match node {
        Node::Nil
        | Node::SelfRef
        | Node::Const { .. }
        | Node::Module { .. }
        | Node::Class { .. } => {}
        Node::True => {
            out.singleton();
            out.node(Node::False);
        }
        Node::False => {
            out.singleton();
            out.node(Node::True);
        }
        Node::Int(value) => {
            out.singleton();
            let candidates = [
                Some(0),
                Some(1),
                value.checked_neg(),
                value.checked_add(1),
                value.checked_sub(1),
            ];
            for candidate in candidates.into_iter().flatten() {
                out.push(Node::int(candidate));
            }
        }
        Node::Str(value) => {
            out.singleton();
            if !value.is_empty() {
                out.node(Node::Str(String::new()));
            }
        }
        Node::Sym(name) => {
            out.singleton();
            out.node(Node::Sym(format!("{}__mutant__", name)));
        }
        Node::Lvar(_) | Node::Ivar(_) => out.singleton(),
        Node::Lvasgn { name, value } | Node::Ivasgn { name, value } => {
            let Some(value) = value else {
                return;
            };
            out.singleton();
            for mutant in mutate(value) {
                let value = Some(mutant);
                out.node(match node {
                    Node::Lvasgn { .. } => Node::Lvasgn {
                        name: name.clone(),
                        value,
                    },
                    _ => Node::Ivasgn {
                        name: name.clone(),
                        value,
                    },
                });
            }
        }
        Node::OrAsgn { target, value }
        | Node::AndAsgn { target, value }
        | Node::OpAsgn { target, value, .. } => {
            out.singleton();
            // Value is child 1, target child 0
            for mutant in mutate(value) {
                if let Some(variant) = node.replace_child(1, mutant) {
                    out.node(variant);
                }
            }
            if matches!(**target, Node::Send { .. }) {
                for mutant in mutate_in(target, Context::AssignmentTarget) {
                    if !matches!(*mutant, Node::Send { .. }) {
                        continue;
                    }
                    if let Some(variant) = node.replace_child(0, mutant) {
                        out.node(variant);
                    }
                }
            }
        }
        Node::Send {
            receiver,
            selector,
            arguments,
        } => send::emit(
            send::SendNode {
                receiver: receiver.as_ref(),
                selector,
                arguments,
            },
            context,
            out,
        ),
        Node::And { left, right } | Node::Or { left, right } => {
            let rebuild = |left: NodeRef, right: NodeRef| match node {
                Node::And { .. } => Node::And { left, right },
                _ => Node::Or { left, right },
            };
            out.singleton();
            out.push(Arc::clone(left));
            out.push(Arc::clone(right));
            for mutant in mutate(left) {
                out.node(rebuild(mutant, Arc::clone(right)));
            }
            for mutant in mutate(right) {
                out.node(rebuild(Arc::clone(left), mutant));
            }
            let (left, right) = (Arc::clone(left), Arc::clone(right));
            out.node(match node {
                Node::And { .. } => Node::Or { left, right },
                _ => Node::And { left, right },
            });
        }
        Node::If {
            condition,
            if_branch,
            else_branch,
        } => emit_if(condition, if_branch, else_branch, out),
        Node::Begin(statements) => {
            for (index, statement) in statements.iter().enumerate() {
                for mutant in mutate(statement) {
                    out.node(Node::Begin(replaced(statements, index, mutant)));
                }
            }
            if statements.len() > 1 {
                for index in 0..statements.len() {
                    out.node(Node::Begin(removed(statements, index)));
                }
            }
        }
        Node::Array(elements) => {
            out.singleton();
            if !elements.is_empty() {
                out.node(Node::Array(Vec::new()));
            }
            for (index, element) in elements.iter().enumerate() {
                for mutant in mutate(element) {
                    out.node(Node::Array(replaced(elements, index, mutant)));
                }
            }
            if elements.len() > 1 {
                for index in 0..elements.len() {
                    out.node(Node::Array(removed(elements, index)));
                }
            }
        }
        Node::Return(value) => {
            if let Some(value) = value {
                for mutant in mutate(value) {
                    out.node(Node::Return(Some(mutant)));
                }
            }
        }
        Node::Block {
            call,
            arguments,
            body,
        } => {
            out.push(Arc::clone(call));
            for mutant in mutate(call) {
                if *mutant == Node::Nil {
                    continue;
                }
                out.node(Node::Block {
                    call: mutant,
                    arguments: arguments.clone(),
                    body: body.clone(),
                });
            }
            if let Some(body) = body {
                for mutant in mutate(body) {
                    out.node(Node::Block {
                        call: Arc::clone(call),
                        arguments: arguments.clone(),
                        body: Some(mutant),
                    });
                }
                out.node(Node::Block {
                    call: Arc::clone(call),
                    arguments: arguments.clone(),
                    body: None,
                });
            }
        }
        Node::Def {
            arguments, body, ..
        }
        | Node::Defs {
            arguments, body, ..
        } => emit_definition(node, arguments, body, out),
    }
}

fn emit_if(
    condition: &NodeRef,
    if_branch: &Option<NodeRef>,
    else_branch: &Option<NodeRef>,
    out: &mut Variants<'_>,
) {
    let rebuild = |condition: NodeRef, if_branch: Option<NodeRef>, else_branch: Option<NodeRef>| {
        Node::If {
            condition,
            if_branch,
            else_branch,
        }
    };

    out.singleton();
    for mutant in mutate(condition) {
        out.node(rebuild(mutant, if_branch.clone(), else_branch.clone()));
    }
    let negated = matches!(
        &**condition,
        Node::Send { selector, arguments, .. } if selector == "!" && arguments.is_empty()
    );
    if !negated {
        let negation = Node::send(Some(Arc::clone(condition)), "!", Vec::new());
        out.node(rebuild(negation, if_branch.clone(), else_branch.clone()));
    }
    out.node(rebuild(
        Arc::new(Node::True),
        if_branch.clone(),
        else_branch.clone(),
    ));
    out.node(rebuild(
        Arc::new(Node::False),
        if_branch.clone(),
        else_branch.clone(),
    ));
    if let Some(branch) = if_branch {
        for mutant in mutate(branch) {
            out.node(rebuild(Arc::clone(condition), Some(mutant), else_branch.clone()));
        }
    }
    if let Some(branch) = else_branch {
        for mutant in mutate(branch) {
            out.node(rebuild(Arc::clone(condition), if_branch.clone(), Some(mutant)));
        }
        out.node(rebuild(Arc::clone(condition), if_branch.clone(), None));
    }
    if if_branch.is_some() {
        out.node(rebuild(Arc::clone(condition), None, else_branch.clone()));
    }
}

fn emit_definition(
    node: &Node,
    arguments: &[String],
    body: &Option<NodeRef>,
    out: &mut Variants<'_>,
) {
    let rebuild = |arguments: Vec<String>, body: Option<NodeRef>| match node {
        Node::Defs {
            singleton, name, ..
        } => Node::Defs {
            singleton: Arc::clone(singleton),
            name: name.clone(),
            arguments,
            body,
        },
        Node::Def { name, .. } => Node::Def {
            name: name.clone(),
            arguments,
            body,
        },
        other => other.clone(),
    };

    out.node(rebuild(arguments.to_vec(), None));
    out.node(rebuild(
        arguments.to_vec(),
        Some(Node::send(None, "raise", Vec::new())),
    ));
    if let Some(body) = body {
        for mutant in mutate(body) {
            out.node(rebuild(arguments.to_vec(), Some(mutant)));
        }
    }
    for index in 0..arguments.len() {
        let mut remaining = arguments.to_vec();
        remaining.remove(index);
        out.node(rebuild(remaining, body.clone()));
    }
}

/// Copy of `nodes` with the element at `index` replaced
fn replaced(nodes: &[NodeRef], index: usize, replacement: NodeRef) -> Vec<NodeRef> {
    let mut nodes = nodes.to_vec();
    nodes[index] = replacement;
    nodes
}

/// Copy of `nodes` without the element at `index`
fn removed(nodes: &[NodeRef], index: usize) -> Vec<NodeRef> {
    let mut nodes = nodes.to_vec();
    nodes.remove(index);
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::read;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn rendered(source: &str) -> Vec<String> {
        let node = read(source).unwrap();
        mutate(&node).iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_or_asgn() {
        assert_eq!(
            rendered("(or_asgn (lvasgn :a) (int 1))"),
            vec!["nil", "a ||= nil", "a ||= 0", "a ||= -1", "a ||= 2"]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(rendered("(true)"), vec!["nil", "false"]);
        assert_eq!(rendered("(int 0)"), vec!["nil", "1", "-1"]);
        assert_eq!(rendered("(str \"\")"), vec!["nil"]);
        assert_eq!(rendered("(sym :a)"), vec!["nil", ":a__mutant__"]);
        assert!(rendered("(nil)").is_empty());
        assert!(rendered("(self)").is_empty());
        assert!(rendered("(const nil :Foo)").is_empty());
    }

    #[test]
    fn test_int_extremes_do_not_overflow() {
        let max = mutate(&Node::Int(i64::MAX));
        assert!(max.contains(&Node::int(i64::MAX - 1)));
        assert!(max.contains(&Node::int(-i64::MAX)));

        let min = mutate(&Node::Int(i64::MIN));
        assert!(min.contains(&Node::int(i64::MIN + 1)));
        assert_eq!(min.len(), 4);
    }

    #[test]
    fn test_and() {
        assert_eq!(
            rendered("(and (lvar :a) (true))"),
            vec![
                "nil",
                "a",
                "true",
                "nil && true",
                "a && nil",
                "a && false",
                "a || true",
            ]
        );
    }

    #[test]
    fn test_if() {
        let variants = rendered("(if (lvar :a) (int 1) nil)");
        assert_eq!(variants[0], "nil");
        assert!(variants.contains(&"if !a\n  1\nend".to_string()));
        assert!(variants.contains(&"if true\n  1\nend".to_string()));
        assert!(variants.contains(&"if false\n  1\nend".to_string()));
        assert!(variants.contains(&"if a\n  2\nend".to_string()));
        assert!(variants.contains(&"if a\nend".to_string()));

        let negated = rendered("(if (send (lvar :a) :!) (int 1) nil)");
        assert!(!negated.iter().any(|v| v.starts_with("if !!a")));
    }

    #[test]
    fn test_begin_and_array() {
        assert_eq!(
            rendered("(begin (lvar :a) (lvar :b))"),
            vec!["nil\nb", "a\nnil", "b", "a"]
        );
        assert_eq!(
            rendered("(array (int 1))"),
            vec!["nil", "[]", "[nil]", "[0]", "[-1]", "[2]"]
        );
    }

    #[test]
    fn test_block() {
        let variants = rendered("(block (send nil :each) (args :x) (lvar :x))");
        assert_eq!(variants[0], "each");
        assert!(variants.contains(&"each do |x|\n  nil\nend".to_string()));
        assert!(variants.contains(&"each do |x|\nend".to_string()));
        assert!(!variants.contains(&"nil".to_string()));
    }

    #[test]
    fn test_def() {
        assert_eq!(
            rendered("(def :foo (args :a :b) (lvar :a))"),
            vec![
                "def foo(a, b)\nend",
                "def foo(a, b)\n  raise\nend",
                "def foo(a, b)\n  nil\nend",
                "def foo(b)\n  a\nend",
                "def foo(a)\n  a\nend",
            ]
        );
        let singleton = rendered("(defs (self) :build (args) (int 1))");
        assert_eq!(singleton[0], "def self.build\nend");
        assert_eq!(singleton[1], "def self.build\n  raise\nend");
    }

    #[test]
    fn test_return() {
        assert_eq!(rendered("(return (true))"), vec!["return nil", "return false"]);
        assert!(rendered("(return)").is_empty());
    }

    fn arb_node() -> impl Strategy<Value = Node> {
        let leaf = prop_oneof![
            Just(Node::Nil),
            Just(Node::True),
            Just(Node::False),
            Just(Node::SelfRef),
            any::<i64>().prop_map(Node::Int),
            "[a-z]{0,3}".prop_map(Node::Str),
            "[a-z]{1,3}".prop_map(Node::Sym),
            "[a-z]{1,3}".prop_map(Node::Lvar),
        ];
        leaf.prop_recursive(4, 24, 3, |inner| {
            let child = inner.prop_map(Arc::new);
            prop_oneof![
                (
                    proptest::option::of(child.clone()),
                    prop::sample::select(vec!["foo", "==", "map", "[]", "[]=", "bar=", "!"]),
                    prop::collection::vec(child.clone(), 0..3),
                )
                    .prop_map(|(receiver, selector, arguments)| Node::Send {
                        receiver,
                        selector: selector.to_string(),
                        arguments,
                    }),
                (child.clone(), child.clone()).prop_map(|(left, right)| Node::And { left, right }),
                (child.clone(), child.clone()).prop_map(|(left, right)| Node::Or { left, right }),
                (
                    child.clone(),
                    proptest::option::of(child.clone()),
                    proptest::option::of(child.clone())
                )
                    .prop_map(|(condition, if_branch, else_branch)| Node::If {
                        condition,
                        if_branch,
                        else_branch,
                    }),
                prop::collection::vec(child.clone(), 0..3).prop_map(Node::Begin),
                prop::collection::vec(child.clone(), 0..3).prop_map(Node::Array),
                child.clone().prop_map(|value| Node::OrAsgn {
                    target: Arc::new(Node::Lvasgn {
                        name: "a".to_string(),
                        value: None,
                    }),
                    value,
                }),
                child.clone().prop_map(|body| Node::Def {
                    name: "m".to_string(),
                    arguments: vec!["x".to_string()],
                    body: Some(body),
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_never_emits_input_or_duplicates(node in arb_node()) {
            let variants = mutate(&node);
            prop_assert!(variants.iter().all(|variant| **variant != node));
            let unique: HashSet<&NodeRef> = variants.iter().collect();
            prop_assert_eq!(unique.len(), variants.len());
        }

        #[test]
        fn prop_deterministic(node in arb_node()) {
            prop_assert_eq!(mutate(&node), mutate(&node));
        }
    }
}
