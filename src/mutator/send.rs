//! Mutations of method sends

use std::sync::Arc;

use super::{mutate, Context, Variants};
use crate::node::{
    is_attribute_assignment, is_binary_operator, is_keyword, is_method_operator, Node, NodeRef,
};

/// Borrowed parts of a `send` node
pub(super) struct SendNode<'a> {
    pub(super) receiver: Option<&'a NodeRef>,
    pub(super) selector: &'a str,
    pub(super) arguments: &'a [NodeRef],
}

impl SendNode<'_> {
    fn with_receiver(&self, receiver: Option<NodeRef>) -> Node {
        Node::Send {
            receiver,
            selector: self.selector.to_string(),
            arguments: self.arguments.to_vec(),
        }
    }

    fn with_selector(&self, selector: &str) -> Node {
        Node::Send {
            receiver: self.receiver.cloned(),
            selector: selector.to_string(),
            arguments: self.arguments.to_vec(),
        }
    }

    fn with_arguments(&self, arguments: Vec<NodeRef>) -> Node {
        Node::Send {
            receiver: self.receiver.cloned(),
            selector: self.selector.to_string(),
            arguments,
        }
    }

    fn node(&self) -> Node {
        self.with_arguments(self.arguments.to_vec())
    }
}

/// Replacement selectors, tried in order
fn selector_replacements(selector: &str) -> &'static [&'static str] {
    match selector {
        "reverse_map" => &["map", "each"],
        "kind_of?" => &["instance_of?"],
        "is_a?" => &["instance_of?"],
        "reverse_each" => &["each"],
        "reverse_merge" => &["merge"],
        "map" => &["each"],
        "send" => &["public_send", "__send__"],
        "__send__" => &["public_send"],
        "gsub" => &["sub"],
        "eql?" => &["equal?"],
        "to_s" => &["to_str"],
        "to_i" => &["to_int"],
        "to_a" => &["to_ary"],
        "at" => &["fetch"],
        "[]" => &["at", "fetch"],
        "==" => &["eql?", "equal?"],
        ">=" => &[">", "==", "eql?", "equal?"],
        "<=" => &["<", "==", "eql?", "equal?"],
        ">" => &["==", ">=", "eql?", "equal?"],
        "<" => &["==", "<=", "eql?", "equal?"],
        _ => &[],
    }
}

pub(super) fn emit(send: SendNode<'_>, context: Context, out: &mut Variants<'_>) {
    out.singleton();

    let node = send.node();
    match send.receiver {
        Some(receiver) if send.selector == "[]=" && !send.arguments.is_empty() => {
            emit_argument_mutations(&send, out);
            emit_receiver_mutations(&send, receiver, out);
        }
        Some(receiver) if send.arguments.len() == 1 && is_binary_operator(send.selector) => {
            emit_binary(&send, receiver, out);
        }
        Some(receiver) if is_attribute_assignment(&node) => {
            emit_argument_mutations(&send, out);
            emit_receiver_mutations(&send, receiver, out);
        }
        _ => emit_dispatch(&send, context, out),
    }
}

fn emit_binary(send: &SendNode<'_>, left: &NodeRef, out: &mut Variants<'_>) {
    let right = &send.arguments[0];

    out.push(Arc::clone(left));
    for mutant in mutate(left) {
        out.node(send.with_receiver(Some(mutant)));
    }
    emit_selector_replacements(send, out);
    out.push(Arc::clone(right));
    for mutant in mutate(right) {
        out.node(send.with_arguments(vec![mutant]));
    }
}

fn emit_dispatch(send: &SendNode<'_>, context: Context, out: &mut Variants<'_>) {
    if let Some(receiver) = send.receiver {
        let literal = matches!(
            **receiver,
            Node::Int(_)
                | Node::Str(_)
                | Node::SelfRef
                | Node::Nil
                | Node::Module { .. }
                | Node::Class { .. }
        );
        if !literal {
            out.push(Arc::clone(receiver));
        }
    }

    emit_selector_replacements(send, out);

    if let [argument] = send.arguments {
        out.push(Arc::clone(argument));
    }

    if let Some(receiver) = send.receiver {
        let implicit_self = matches!(**receiver, Node::SelfRef)
            && !is_keyword(send.selector)
            && !is_method_operator(send.selector)
            && context != Context::AssignmentTarget;
        if implicit_self {
            out.node(send.with_receiver(None));
        }
        emit_receiver_mutations(send, receiver, out);
    }

    if !send.arguments.is_empty() {
        out.node(send.with_arguments(Vec::new()));
    }
    emit_argument_mutations(send, out);
    for index in 0..send.arguments.len() {
        out.node(send.with_arguments(super::removed(send.arguments, index)));
    }
}

fn emit_selector_replacements(send: &SendNode<'_>, out: &mut Variants<'_>) {
    for selector in selector_replacements(send.selector) {
        out.node(send.with_selector(selector));
    }
}

fn emit_receiver_mutations(send: &SendNode<'_>, receiver: &NodeRef, out: &mut Variants<'_>) {
    for mutant in mutate(receiver) {
        if *mutant == Node::Nil {
            continue;
        }
        out.node(send.with_receiver(Some(mutant)));
    }
}

fn emit_argument_mutations(send: &SendNode<'_>, out: &mut Variants<'_>) {
    for (index, argument) in send.arguments.iter().enumerate() {
        for mutant in mutate(argument) {
            out.node(send.with_arguments(super::replaced(send.arguments, index, mutant)));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::mutator::mutate;
    use crate::sexp::read;
    use pretty_assertions::assert_eq;

    fn rendered(source: &str) -> Vec<String> {
        let node = read(source).unwrap();
        mutate(&node).iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_binary_operator() {
        assert_eq!(
            rendered("(send (lvar :a) :== (lvar :b))"),
            vec!["nil", "a", "nil == b", "a.eql?(b)", "a.equal?(b)", "b", "a == nil"]
        );
    }

    #[test]
    fn test_comparison_replacements_are_directional() {
        let variants = rendered("(send (lvar :a) :>= (lvar :b))");
        assert!(variants.contains(&"a > b".to_string()));
        assert!(variants.contains(&"a == b".to_string()));
        assert!(!variants.contains(&"a <= b".to_string()));
    }

    #[test]
    fn test_dispatch() {
        assert_eq!(
            rendered("(send (lvar :list) :map (lvar :f))"),
            vec![
                "nil",
                "list",
                "list.each(f)",
                "f",
                "list.map",
                "list.map(nil)",
            ]
        );
    }

    #[test]
    fn test_implicit_self() {
        let variants = rendered("(send (self) :foo (int 1))");
        assert!(variants.contains(&"foo(1)".to_string()));
        assert!(!variants.contains(&"self".to_string()));

        let keyword = rendered("(send (self) :class)");
        assert!(!keyword.contains(&"class".to_string()));
    }

    #[test]
    fn test_assignment_target_keeps_explicit_self() {
        let variants = rendered("(or_asgn (send (self) :foo) (int 1))");
        assert!(variants.contains(&"self.foo ||= nil".to_string()));
        assert!(!variants.iter().any(|v| v.starts_with("foo ||=")));
        assert!(!variants.iter().any(|v| v.starts_with("self ||=")));
    }

    #[test]
    fn test_index_assignment() {
        let variants = rendered("(send (lvar :h) :[]= (sym :k) (int 1))");
        assert_eq!(variants[0], "nil");
        assert!(variants.contains(&"h[:k__mutant__] = 1".to_string()));
        assert!(variants.contains(&"h[:k] = 2".to_string()));
        assert!(!variants.contains(&"h".to_string()));
    }

    #[test]
    fn test_attribute_assignment() {
        assert_eq!(
            rendered("(send (lvar :o) :size= (int 0))"),
            vec!["nil", "o.size = nil", "o.size = 1", "o.size = -1"]
        );
    }

    #[test]
    fn test_literal_receiver_is_not_emitted() {
        let variants = rendered("(send (int 5) :succ)");
        assert!(!variants.contains(&"5".to_string()));
        assert!(variants.contains(&"6.succ".to_string()));
    }
}
