//! Expressions selecting scopes and methods
//!
//! | syntax        | variant     | selects                                   |
//! |---------------|-------------|-------------------------------------------|
//! | `Foo::Bar`    | `Namespace` | methods of exactly `Foo::Bar`             |
//! | `Foo*`, `*`   | `Recursive` | `Foo` and every scope nested below it     |
//! | `Foo#`/`Foo.` | `Methods`   | all instance / singleton methods of `Foo` |
//! | `Foo#bar`     | `Method`    | one instance method                       |
//! | `Foo.bar`     | `Method`    | one singleton method                      |

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MutantError, Result};

const SCOPE_NAME: &str = r"[A-Z]\w*(?:::[A-Z]\w*)*";
const METHOD_NAME: &str =
    r"[A-Za-z_]\w*[?!=]?|<=>|===?|=~|!~|!=|\[\]=?|<<|>>|\*\*|[<>]=?|[+\-]@?|[*/%&|^~!]";

static NAMESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\A(?P<scope>{SCOPE_NAME})\z")).expect("valid expression grammar")
});
static RECURSIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\A(?P<scope>{SCOPE_NAME})?\*\z")).expect("valid expression grammar")
});
static METHODS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\A(?P<scope>{SCOPE_NAME})(?P<symbol>[.#])\z"))
        .expect("valid expression grammar")
});
static METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\A(?P<scope>{SCOPE_NAME})(?P<symbol>[.#])(?P<method>{METHOD_NAME})\z"
    ))
    .expect("valid expression grammar")
});

/// Separator between a scope name and a method name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeSymbol {
    /// `#`
    Instance,
    /// `.`
    Singleton,
}

impl ScopeSymbol {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeSymbol::Instance => "#",
            ScopeSymbol::Singleton => ".",
        }
    }

    fn from_capture(symbol: &str) -> Self {
        if symbol == "." {
            ScopeSymbol::Singleton
        } else {
            ScopeSymbol::Instance
        }
    }
}

/// A selector over named scopes and methods
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Expression {
    Namespace {
        scope_name: String,
    },
    Recursive {
        scope_name: String,
    },
    Methods {
        scope_name: String,
        scope_symbol: ScopeSymbol,
    },
    Method {
        scope_name: String,
        scope_symbol: ScopeSymbol,
        method_name: String,
    },
}

impl Expression {
    /// Parse expression syntax
    pub fn parse(input: &str) -> Result<Self> {
        Self::try_parse(input).ok_or_else(|| MutantError::InvalidExpression {
            input: input.to_string(),
        })
    }

    /// Parse expression syntax, `None` when no grammar matches
    pub fn try_parse(input: &str) -> Option<Self> {
        let scope = |captures: &regex::Captures<'_>| {
            captures
                .name("scope")
                .map(|scope| scope.as_str().to_string())
                .unwrap_or_default()
        };
        let symbol = |captures: &regex::Captures<'_>| {
            ScopeSymbol::from_capture(captures.name("symbol").map_or("#", |m| m.as_str()))
        };

        if let Some(captures) = METHOD.captures(input) {
            return Some(Expression::Method {
                scope_name: scope(&captures),
                scope_symbol: symbol(&captures),
                method_name: captures.name("method")?.as_str().to_string(),
            });
        }
        if let Some(captures) = METHODS.captures(input) {
            return Some(Expression::Methods {
                scope_name: scope(&captures),
                scope_symbol: symbol(&captures),
            });
        }
        if let Some(captures) = RECURSIVE.captures(input) {
            return Some(Expression::Recursive {
                scope_name: scope(&captures),
            });
        }
        NAMESPACE.captures(input).map(|captures| Expression::Namespace {
            scope_name: scope(&captures),
        })
    }

    pub fn namespace(scope_name: &str) -> Self {
        Expression::Namespace {
            scope_name: scope_name.to_string(),
        }
    }

    pub fn recursive(scope_name: &str) -> Self {
        Expression::Recursive {
            scope_name: scope_name.to_string(),
        }
    }

    pub fn method(scope_name: &str, scope_symbol: ScopeSymbol, method_name: &str) -> Self {
        Expression::Method {
            scope_name: scope_name.to_string(),
            scope_symbol,
            method_name: method_name.to_string(),
        }
    }

    /// Canonical syntax
    pub fn syntax(&self) -> String {
        match self {
            Expression::Namespace { scope_name } => scope_name.clone(),
            Expression::Recursive { scope_name } => format!("{}*", scope_name),
            Expression::Methods {
                scope_name,
                scope_symbol,
            } => format!("{}{}", scope_name, scope_symbol.as_str()),
            Expression::Method {
                scope_name,
                scope_symbol,
                method_name,
            } => format!("{}{}{}", scope_name, scope_symbol.as_str(), method_name),
        }
    }

    pub fn scope_name(&self) -> &str {
        match self {
            Expression::Namespace { scope_name }
            | Expression::Recursive { scope_name }
            | Expression::Methods { scope_name, .. }
            | Expression::Method { scope_name, .. } => scope_name,
        }
    }

    /// Degree of match against `other`, 0 when it does not match
    ///
    /// An equal expression matches with the length of its own syntax, so
    /// longer, more specific expressions win ties.
    pub fn match_length(&self, other: &Expression) -> usize {
        if self == other {
            return self.syntax().len();
        }
        let other_syntax = other.syntax();
        match self {
            Expression::Recursive { scope_name } => {
                if !scope_name.is_empty() && within_scope(scope_name, &other_syntax) {
                    scope_name.len()
                } else {
                    0
                }
            }
            Expression::Methods { .. } => {
                let syntax = self.syntax();
                if other_syntax.starts_with(&syntax) {
                    syntax.len()
                } else {
                    0
                }
            }
            Expression::Namespace { .. } | Expression::Method { .. } => 0,
        }
    }

    /// Whether this expression's scope contains `other`
    ///
    /// Containment stops at name boundaries: `Foo` contains `Foo::Bar` and
    /// `Foo#bar` but not `Foobar`, and `Foo#a` contains only itself.
    pub fn prefix(&self, other: &Expression) -> bool {
        if self == other {
            return true;
        }
        match self {
            Expression::Recursive { scope_name } if scope_name.is_empty() => true,
            Expression::Recursive { .. } => self.match_length(other) > 0,
            Expression::Namespace { scope_name } => within_scope(scope_name, &other.syntax()),
            Expression::Methods { .. } => other
                .syntax()
                .strip_prefix(&self.syntax())
                .is_some_and(|method_name| !method_name.is_empty()),
            Expression::Method { .. } => false,
        }
    }

    /// Candidate with the greatest match length against `target`
    ///
    /// Candidates that do not match are ignored. Two candidates sharing the
    /// best length make the selection ambiguous.
    pub fn best_match<'a>(
        candidates: impl IntoIterator<Item = &'a Expression>,
        target: &Expression,
    ) -> Result<Option<&'a Expression>> {
        let mut best: Option<(&Expression, usize)> = None;
        let mut tied = Vec::new();
        for candidate in candidates {
            let length = candidate.match_length(target);
            if length == 0 {
                continue;
            }
            match best {
                Some((_, best_length)) if length < best_length => {}
                Some((_, best_length)) if length == best_length => tied.push(candidate),
                _ => {
                    best = Some((candidate, length));
                    tied.clear();
                }
            }
        }
        if let (Some((current, _)), false) = (best, tied.is_empty()) {
            return Err(MutantError::AmbiguousExpression {
                target: target.syntax(),
                candidates: std::iter::once(current)
                    .chain(tied)
                    .map(Expression::syntax)
                    .collect(),
            });
        }
        Ok(best.map(|(expression, _)| expression))
    }
}

/// Recursion boundary: the scope itself, a nested scope, or a method of it
fn within_scope(scope_name: &str, syntax: &str) -> bool {
    match syntax.strip_prefix(scope_name) {
        Some(rest) => {
            rest.is_empty() || rest.starts_with("::") || rest.starts_with('#') || rest.starts_with('.')
        }
        None => false,
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.syntax())
    }
}

impl FromStr for Expression {
    type Err = MutantError;

    fn from_str(input: &str) -> Result<Self> {
        Expression::parse(input)
    }
}

impl TryFrom<String> for Expression {
    type Error = MutantError;

    fn try_from(input: String) -> Result<Self> {
        Expression::parse(&input)
    }
}

impl From<Expression> for String {
    fn from(expression: Expression) -> Self {
        expression.syntax()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn parse(input: &str) -> Expression {
        Expression::parse(input).unwrap()
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(parse("Foo::Bar"), Expression::namespace("Foo::Bar"));
        assert_eq!(parse("Foo*"), Expression::recursive("Foo"));
        assert_eq!(parse("*"), Expression::recursive(""));
        assert_eq!(
            parse("Foo#"),
            Expression::Methods {
                scope_name: "Foo".to_string(),
                scope_symbol: ScopeSymbol::Instance,
            }
        );
        assert_eq!(
            parse("Foo.bar?"),
            Expression::method("Foo", ScopeSymbol::Singleton, "bar?")
        );
        assert_eq!(
            parse("Foo#<=>"),
            Expression::method("Foo", ScopeSymbol::Instance, "<=>")
        );
        assert_eq!(
            parse("Foo#[]="),
            Expression::method("Foo", ScopeSymbol::Instance, "[]=")
        );
    }

    #[test]
    fn test_parse_rejects_invalid_syntax() {
        for input in ["", "foo", "Foo::", "Foo**", "Foo#bar baz", "::Foo", "Foo#bar*"] {
            assert!(
                matches!(
                    Expression::parse(input),
                    Err(MutantError::InvalidExpression { .. })
                ),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn test_methods_match_length() {
        let object = parse("TestApp::Literal#");
        assert_eq!(object.match_length(&object.clone()), "TestApp::Literal#".len());
        assert_eq!(
            object.match_length(&parse("TestApp::Literal#foo")),
            "TestApp::Literal#".len()
        );
        assert_eq!(object.match_length(&parse("Foo*")), 0);
    }

    #[test]
    fn test_recursive_match_length() {
        let object = parse("Foo*");
        assert_eq!(object.match_length(&parse("Foo")), 3);
        assert_eq!(object.match_length(&parse("Foo::Bar")), 3);
        assert_eq!(object.match_length(&parse("Foo#baz")), 3);
        assert_eq!(object.match_length(&parse("Foo.baz")), 3);
        assert_eq!(object.match_length(&parse("Foobar")), 0);
        assert_eq!(object.match_length(&parse("Baz")), 0);
        assert_eq!(object.match_length(&object), 4);
    }

    #[test]
    fn test_exact_match_length() {
        assert_eq!(parse("Foo").match_length(&parse("Foo")), 3);
        assert_eq!(parse("Foo").match_length(&parse("Foo::Bar")), 0);
        assert_eq!(parse("Foo#bar").match_length(&parse("Foo#bar")), 7);
        assert_eq!(parse("Foo#bar").match_length(&parse("Foo#baz")), 0);
    }

    #[test]
    fn test_prefix() {
        assert!(parse("Foo*").prefix(&parse("Foo::Bar")));
        assert!(!parse("Foo*").prefix(&parse("Bar")));
        assert!(parse("*").prefix(&parse("Bar#baz")));
        assert!(parse("Foo").prefix(&parse("Foo#bar")));
        assert!(!parse("Foo#bar").prefix(&parse("Foo")));
        assert!(parse("Foo*").prefix(&parse("Foo::Bar*")));
        assert!(parse("Foo::Bar*").prefix(&parse("Foo::Bar::Baz")));
        assert!(parse("Foo*").prefix(&parse("Foo::Bar::Baz")));
        assert!(parse("Foo").prefix(&parse("Foo::Bar")));
        assert!(parse("Foo#").prefix(&parse("Foo#bar")));
        assert!(!parse("Foo#").prefix(&parse("Foo.bar")));
    }

    #[test]
    fn test_prefix_stops_at_name_boundaries() {
        assert!(!parse("Foo#a").prefix(&parse("Foo#ab")));
        assert!(!parse("Foo").prefix(&parse("Foobar#x")));
        assert!(!parse("Foo").prefix(&parse("Foobar")));
        assert!(!parse("Foo#").prefix(&parse("Foobar#x")));
        assert!(!parse("App::Greeter#debug").prefix(&parse("App::Greeter#debug_info")));
        assert!(!parse("Foo*").prefix(&parse("Foobar::Baz")));
    }

    #[test]
    fn test_best_match() {
        let candidates = [parse("Foo*"), parse("Foo::Bar*"), parse("Baz*")];
        let best = Expression::best_match(&candidates, &parse("Foo::Bar#baz")).unwrap();
        assert_eq!(best, Some(&candidates[1]));

        let best = Expression::best_match(&candidates, &parse("Qux")).unwrap();
        assert_eq!(best, None);

        let candidates = [parse("Foo*"), parse("Foo#")];
        let best = Expression::best_match(&candidates, &parse("Foo#bar")).unwrap();
        assert_eq!(best, Some(&candidates[1]));
    }

    #[test]
    fn test_best_match_tie_is_ambiguous() {
        let candidates = [parse("Foo*"), parse("Foo*")];
        let error = Expression::best_match(&candidates, &parse("Foo::Bar")).unwrap_err();
        assert!(matches!(
            error,
            MutantError::AmbiguousExpression { ref candidates, .. } if candidates.len() == 2
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let expressions: Vec<Expression> = serde_yaml::from_str("- Foo*\n- Foo#bar\n").unwrap();
        assert_eq!(expressions, vec![parse("Foo*"), parse("Foo#bar")]);
        assert!(serde_yaml::from_str::<Expression>("foo").is_err());
        assert_eq!(serde_yaml::to_string(&parse("Foo.")).unwrap().trim(), "Foo.");
    }

    fn scope_name() -> impl Strategy<Value = String> {
        prop::collection::vec("[A-Z][a-z0-9_]{0,5}", 1..4).prop_map(|parts| parts.join("::"))
    }

    fn expression() -> impl Strategy<Value = Expression> {
        prop_oneof![
            scope_name().prop_map(|scope_name| Expression::Namespace { scope_name }),
            prop::option::of(scope_name()).prop_map(|scope_name| Expression::Recursive {
                scope_name: scope_name.unwrap_or_default(),
            }),
            (scope_name(), any::<bool>()).prop_map(|(scope_name, singleton)| {
                Expression::Methods {
                    scope_name,
                    scope_symbol: if singleton {
                        ScopeSymbol::Singleton
                    } else {
                        ScopeSymbol::Instance
                    },
                }
            }),
            (scope_name(), "[a-z_][a-z0-9_]{0,6}[?!]?").prop_map(|(scope_name, method)| {
                Expression::method(&scope_name, ScopeSymbol::Instance, &method)
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_parse_round_trips(expression in expression()) {
            prop_assert_eq!(Expression::parse(&expression.syntax()).unwrap(), expression);
        }

        #[test]
        fn prop_self_match_length_is_syntax_length(expression in expression()) {
            prop_assert_eq!(expression.match_length(&expression), expression.syntax().len());
            prop_assert!(expression.prefix(&expression));
        }

        #[test]
        fn prop_disjoint_scopes_do_not_match(a in scope_name(), b in scope_name()) {
            prop_assume!(!within_scope(&a, &b) && !within_scope(&b, &a));
            prop_assert_eq!(Expression::recursive(&a).match_length(&Expression::namespace(&b)), 0);
            prop_assert_eq!(Expression::namespace(&a).match_length(&Expression::namespace(&b)), 0);
        }

        #[test]
        fn prop_recursive_prefix_is_transitive(a in scope_name(), b in "[A-Z][a-z]{0,4}", c in "[A-Z][a-z]{0,4}") {
            let outer = Expression::recursive(&a);
            let middle = Expression::recursive(&format!("{a}::{b}"));
            let inner = Expression::namespace(&format!("{a}::{b}::{c}"));
            prop_assert!(outer.prefix(&middle));
            prop_assert!(middle.prefix(&inner));
            prop_assert!(outer.prefix(&inner));
        }
    }
}
