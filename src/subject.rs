//! Subjects and their mutations

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::codegen::generate_source;
use crate::error::Result;
use crate::expression::Expression;
use crate::mutator::mutate;
use crate::node::NodeRef;
use crate::program::{
    MatchableScope, MethodDefinition, MethodKind, ProgramImage, SourceLocation,
};

/// One method body selected for mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub scope_name: String,
    pub method_name: String,
    pub kind: MethodKind,
    /// Original `def`/`defs` node
    pub node: NodeRef,
    pub location: SourceLocation,
    expression: Expression,
}

impl Subject {
    pub fn new(
        scope: &MatchableScope,
        method: &MethodDefinition,
        location: SourceLocation,
    ) -> Self {
        Self {
            scope_name: scope.name.clone(),
            method_name: method.name.clone(),
            kind: method.kind,
            node: NodeRef::clone(&method.node),
            location,
            expression: scope.method_expression(method),
        }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Expressions used to select tests, most specific first
    ///
    /// The subject's own expression, then a recursive expression for each
    /// enclosing scope from the innermost outward.
    pub fn match_expressions(&self) -> Vec<Expression> {
        let segments: Vec<&str> = self.scope_name.split("::").collect();
        let enclosing = (1..=segments.len())
            .rev()
            .map(|depth| Expression::recursive(&segments[..depth].join("::")));
        std::iter::once(self.expression.clone())
            .chain(enclosing)
            .collect()
    }

    /// All mutations of this subject
    pub fn mutations(self: &Arc<Self>) -> Vec<Mutation> {
        mutate(&self.node)
            .into_iter()
            .map(|node| Mutation::new(Arc::clone(self), node))
            .collect()
    }

    /// `<expression>:<path>`
    pub fn identification(&self) -> String {
        format!("{}:{}", self.expression, self.location.path.display())
    }

    pub fn source(&self) -> String {
        generate_source(&self.node)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identification())
    }
}

/// A subject paired with one replacement node
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    subject: Arc<Subject>,
    node: NodeRef,
}

impl Mutation {
    pub fn new(subject: Arc<Subject>, node: NodeRef) -> Self {
        Self { subject, node }
    }

    pub fn subject(&self) -> &Arc<Subject> {
        &self.subject
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Five hex digit digest of the subject and the replacement node
    pub fn code(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.subject.identification().hash(&mut hasher);
        self.node.hash(&mut hasher);
        format!("{:05x}", hasher.finish() & 0xf_ffff)
    }

    /// `<expression>:<path>:<code>`
    pub fn identification(&self) -> String {
        format!("{}:{}", self.subject.identification(), self.code())
    }

    /// Program image with the subject replaced by this mutation
    pub fn insert(&self, image: &ProgramImage) -> Result<ProgramImage> {
        image.insert(&self.subject.location, NodeRef::clone(&self.node))
    }

    pub fn source(&self) -> String {
        generate_source(&self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Universe;
    use crate::sexp::read;
    use pretty_assertions::assert_eq;

    fn subject(source: &str, scope: &str) -> (ProgramImage, Arc<Subject>) {
        let mut image = ProgramImage::new();
        image.load("lib/foo.sexp", read(source).unwrap());
        let universe = Universe::discover(&image);
        let scope = universe.scope(scope).unwrap();
        let method = &scope.methods[0];
        let subject = Subject::new(scope, method, method.location.clone().unwrap());
        (image, Arc::new(subject))
    }

    const SOURCE: &str =
        "(module (const nil :Foo) (class (const nil :Bar) nil (def :baz (args) (int 1))))";

    #[test]
    fn test_match_expressions() {
        let (_, subject) = subject(SOURCE, "Foo::Bar");
        let expressions: Vec<String> = subject
            .match_expressions()
            .iter()
            .map(Expression::syntax)
            .collect();
        assert_eq!(expressions, vec!["Foo::Bar#baz", "Foo::Bar*", "Foo*"]);
    }

    #[test]
    fn test_identification() {
        let (_, subject) = subject(SOURCE, "Foo::Bar");
        assert_eq!(subject.identification(), "Foo::Bar#baz:lib/foo.sexp");

        let mutations = subject.mutations();
        let id = mutations[0].identification();
        let code = id.rsplit(':').next().unwrap();
        assert!(id.starts_with("Foo::Bar#baz:lib/foo.sexp:"));
        assert_eq!(code.len(), 5);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, mutations[0].identification());
        assert_ne!(mutations[0].code(), mutations[1].code());
    }

    #[test]
    fn test_insert_leaves_image_untouched() {
        let (image, subject) = subject(SOURCE, "Foo::Bar");
        let mutations = subject.mutations();
        let mutation = &mutations[0];
        assert_eq!(mutation.source(), "def baz\nend");

        let mutated = mutation.insert(&image).unwrap();
        assert_eq!(mutated.node_at(&subject.location), Some(&**mutation.node()));
        assert_eq!(image.node_at(&subject.location), Some(&*subject.node));
    }
}
