//! Subject matching
//!
//! Matchers resolve expressions against the [`Universe`] of matchable scopes
//! and yield [`Subject`]s lazily. Every call to [`Matcher::subjects`] starts
//! a fresh sequence.

use std::collections::HashSet;

use crate::config::MatcherConfig;
use crate::expression::Expression;
use crate::program::{MatchableScope, MethodDefinition, Universe};
use crate::report::Reporter;
use crate::subject::Subject;

/// Source path prefixes of code that cannot be mutated
const DISALLOWED_PREFIXES: &[&str] = &["kernel/"];
/// Source path fragments of generated code
const DISALLOWED_FRAGMENTS: &[&str] = &["(eval)"];

/// Yields the subjects selected from a universe
pub trait Matcher: Send + Sync {
    fn subjects<'a>(
        &'a self,
        universe: &'a Universe,
        reporter: &'a dyn Reporter,
    ) -> Box<dyn Iterator<Item = Subject> + 'a>;
}

/// Build a subject for `method`, or warn and skip it
fn subject(
    scope: &MatchableScope,
    method: &MethodDefinition,
    reporter: &dyn Reporter,
) -> Option<Subject> {
    let expression = scope.method_expression(method);
    let skip = |reason: &str| {
        let message = format!("{}: {}, skipping", expression, reason);
        tracing::warn!(subject = %expression, "{}", reason);
        reporter.warn(&message);
    };

    let Some(location) = &method.location else {
        skip("no source location");
        return None;
    };
    let path = location.path.to_string_lossy();
    let disallowed = DISALLOWED_PREFIXES.iter().any(|p| path.starts_with(p))
        || DISALLOWED_FRAGMENTS.iter().any(|f| path.contains(f));
    if disallowed {
        skip(&format!("defined in disallowed origin {}", location.path.display()));
        return None;
    }
    if method.within_block {
        skip("defined inside a block");
        return None;
    }
    Some(Subject::new(scope, method, location.clone()))
}

/// Matcher for a single expression
#[derive(Debug, Clone)]
pub struct ExpressionMatcher {
    expression: Expression,
}

impl ExpressionMatcher {
    pub fn new(expression: Expression) -> Self {
        Self { expression }
    }

    fn selects_scope(&self, scope: &MatchableScope) -> bool {
        match &self.expression {
            Expression::Recursive { .. } => self.expression.prefix(&scope.expression),
            other => other.scope_name() == scope.name,
        }
    }

    fn selects_method(&self, scope: &MatchableScope, method: &MethodDefinition) -> bool {
        match &self.expression {
            Expression::Namespace { .. } | Expression::Recursive { .. } => true,
            Expression::Methods { scope_symbol, .. } => method.kind.symbol() == *scope_symbol,
            Expression::Method { .. } => scope.method_expression(method) == self.expression,
        }
    }
}

impl Matcher for ExpressionMatcher {
    fn subjects<'a>(
        &'a self,
        universe: &'a Universe,
        reporter: &'a dyn Reporter,
    ) -> Box<dyn Iterator<Item = Subject> + 'a> {
        Box::new(
            universe
                .scopes()
                .iter()
                .filter(move |scope| self.selects_scope(scope))
                .flat_map(move |scope| {
                    scope
                        .methods
                        .iter()
                        .filter(move |method| self.selects_method(scope, method))
                        .filter_map(move |method| subject(scope, method, reporter))
                }),
        )
    }
}

type Predicate = dyn Fn(&Subject) -> bool + Send + Sync;

/// Lazy predicate filter over another matcher
pub struct Filter {
    matcher: Box<dyn Matcher>,
    predicate: Box<Predicate>,
}

impl Filter {
    pub fn build<F>(matcher: Box<dyn Matcher>, predicate: F) -> Self
    where
        F: Fn(&Subject) -> bool + Send + Sync + 'static,
    {
        Self {
            matcher,
            predicate: Box::new(predicate),
        }
    }
}

impl Matcher for Filter {
    fn subjects<'a>(
        &'a self,
        universe: &'a Universe,
        reporter: &'a dyn Reporter,
    ) -> Box<dyn Iterator<Item = Subject> + 'a> {
        Box::new(
            self.matcher
                .subjects(universe, reporter)
                .filter(move |subject| (self.predicate)(subject)),
        )
    }
}

/// Concatenation of matchers
#[derive(Default)]
pub struct Chain {
    matchers: Vec<Box<dyn Matcher>>,
}

impl Chain {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for Chain {
    fn subjects<'a>(
        &'a self,
        universe: &'a Universe,
        reporter: &'a dyn Reporter,
    ) -> Box<dyn Iterator<Item = Subject> + 'a> {
        Box::new(
            self.matchers
                .iter()
                .flat_map(move |matcher| matcher.subjects(universe, reporter)),
        )
    }
}

/// Suppresses subjects already yielded with the same expression
struct Unique {
    matcher: Box<dyn Matcher>,
}

impl Matcher for Unique {
    fn subjects<'a>(
        &'a self,
        universe: &'a Universe,
        reporter: &'a dyn Reporter,
    ) -> Box<dyn Iterator<Item = Subject> + 'a> {
        let mut seen = HashSet::new();
        Box::new(
            self.matcher
                .subjects(universe, reporter)
                .filter(move |subject| seen.insert(subject.expression().clone())),
        )
    }
}

/// Compiles matcher configuration into one matcher
pub struct Compiler;

impl Compiler {
    pub fn compile(config: &MatcherConfig) -> Box<dyn Matcher> {
        let chain = Chain::new(
            config
                .match_expressions
                .iter()
                .map(|expression| {
                    Box::new(ExpressionMatcher::new(expression.clone())) as Box<dyn Matcher>
                })
                .collect(),
        );

        let ignored = config.ignore_expressions.clone();
        let filtered = Filter::build(Box::new(chain), move |subject| {
            !ignored
                .iter()
                .any(|ignore| ignore.prefix(subject.expression()))
        });

        Box::new(Unique {
            matcher: Box::new(filtered),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{MethodKind, ProgramImage, SourceLocation};
    use crate::report::NullReporter;
    use crate::sexp::read;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
        (begin
          (class (const nil :Foo) nil
            (begin
              (def :a (args) nil)
              (defs (self) :b (args) nil)))
          (class (const (const nil :Foo) :Bar) nil
            (def :c (args) nil))
          (class (const nil :Foobar) nil
            (begin
              (def :d (args) nil)
              (block (send nil :included) (args) (def :e (args) nil)))))
    "#;

    fn universe_from(path: &str) -> Universe {
        let mut image = ProgramImage::new();
        image.load(path, read(SOURCE).unwrap());
        Universe::discover(&image)
    }

    fn universe() -> Universe {
        universe_from("lib/foo.sexp")
    }

    fn expression(input: &str) -> Expression {
        Expression::parse(input).unwrap()
    }

    fn matched(matcher: &dyn Matcher, universe: &Universe) -> Vec<String> {
        matcher
            .subjects(universe, &NullReporter)
            .map(|subject| subject.expression().syntax())
            .collect()
    }

    #[test]
    fn test_recursive_expression() {
        let matcher = ExpressionMatcher::new(expression("Foo*"));
        assert_eq!(
            matched(&matcher, &universe()),
            vec!["Foo#a", "Foo.b", "Foo::Bar#c"]
        );
    }

    #[test]
    fn test_root_expression_skips_block_methods() {
        let matcher = ExpressionMatcher::new(expression("*"));
        assert_eq!(
            matched(&matcher, &universe()),
            vec!["Foo#a", "Foo.b", "Foo::Bar#c", "Foobar#d"]
        );
    }

    #[test]
    fn test_exact_expressions() {
        let universe = universe();
        let cases = [
            ("Foo", vec!["Foo#a", "Foo.b"]),
            ("Foo#", vec!["Foo#a"]),
            ("Foo.", vec!["Foo.b"]),
            ("Foo.b", vec!["Foo.b"]),
            ("Foo#b", vec![]),
            ("Baz*", vec![]),
        ];
        for (input, expected) in cases {
            let matcher = ExpressionMatcher::new(expression(input));
            assert_eq!(matched(&matcher, &universe), expected, "{}", input);
        }
    }

    #[test]
    fn test_subjects_restart() {
        let universe = universe();
        let matcher = ExpressionMatcher::new(expression("Foo*"));
        assert_eq!(matched(&matcher, &universe), matched(&matcher, &universe));
    }

    #[test]
    fn test_disallowed_origin_is_skipped() {
        let matcher = ExpressionMatcher::new(expression("*"));
        assert!(matched(&matcher, &universe_from("kernel/foo.sexp")).is_empty());
        assert!(matched(&matcher, &universe_from("(eval)")).is_empty());
    }

    #[test]
    fn test_filter_and_chain() {
        let universe = universe();
        let chain = Chain::new(vec![
            Box::new(ExpressionMatcher::new(expression("Foo::Bar"))),
            Box::new(ExpressionMatcher::new(expression("Foobar"))),
        ]);
        assert_eq!(matched(&chain, &universe), vec!["Foo::Bar#c", "Foobar#d"]);

        let filter = Filter::build(Box::new(chain), |subject| subject.method_name != "c");
        assert_eq!(matched(&filter, &universe), vec!["Foobar#d"]);
    }

    #[test]
    fn test_compiler_ignores_and_deduplicates() {
        let config = MatcherConfig {
            match_expressions: vec![expression("Foo*"), expression("Foo#a"), expression("Foobar")],
            ignore_expressions: vec![expression("Foo::Bar*")],
        };
        let matcher = Compiler::compile(&config);
        assert_eq!(
            matched(matcher.as_ref(), &universe()),
            vec!["Foo#a", "Foo.b", "Foobar#d"]
        );
    }

    #[test]
    fn test_ignore_expression_spares_similar_names() {
        let mut image = ProgramImage::new();
        image.load(
            "lib/foo.sexp",
            read("(class (const nil :Foo) nil (begin (def :a (args) nil) (def :ab (args) nil)))")
                .unwrap(),
        );
        let config = MatcherConfig {
            match_expressions: vec![expression("Foo*")],
            ignore_expressions: vec![expression("Foo#a")],
        };
        let matcher = Compiler::compile(&config);
        assert_eq!(
            matched(matcher.as_ref(), &Universe::discover(&image)),
            vec!["Foo#ab"]
        );
    }

    #[derive(Default)]
    struct Warnings(parking_lot::Mutex<Vec<String>>);

    impl Reporter for Warnings {
        fn start(&self, _env: &crate::env::Env) {}
        fn progress(&self, _status: &crate::parallel::Status<crate::result::EnvResult>) {}
        fn report(&self, _result: &crate::result::EnvResult) {}
        fn warn(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
        fn delay(&self) -> std::time::Duration {
            std::time::Duration::from_millis(1)
        }
    }

    #[test]
    fn test_method_without_location_is_skipped() {
        let method = |name: &str, location: Option<SourceLocation>| MethodDefinition {
            name: name.to_string(),
            kind: MethodKind::Instance,
            node: read(&format!("(def :{} (args) nil)", name)).unwrap(),
            location,
            within_block: false,
        };
        let mut scope = MatchableScope::new("Foo");
        scope.methods.push(method("native", None));
        scope
            .methods
            .push(method("mapped", Some(SourceLocation::new("lib/foo.sexp", vec![1]))));
        let universe = Universe::new(vec![scope]);

        let warnings = Warnings::default();
        let subjects: Vec<String> = ExpressionMatcher::new(expression("Foo"))
            .subjects(&universe, &warnings)
            .map(|subject| subject.expression().syntax())
            .collect();
        assert_eq!(subjects, vec!["Foo#mapped"]);
        assert_eq!(
            *warnings.0.lock(),
            vec!["Foo#native: no source location, skipping".to_string()]
        );
    }
}
