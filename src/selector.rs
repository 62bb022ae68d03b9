//! Test selection for subjects

use crate::error::Result;
use crate::expression::Expression;
use crate::integration::Test;
use crate::subject::Subject;

/// Maps a subject to the tests that cover it
#[derive(Debug, Clone, Default)]
pub struct Selector {
    tests: Vec<Test>,
}

impl Selector {
    pub fn new(tests: Vec<Test>) -> Self {
        Self { tests }
    }

    /// Tests to run against mutations of `subject`
    ///
    /// The test expression with the greatest match length against the
    /// subject wins. Without any such expression, the first of the subject's
    /// match expressions that contains at least one test expression selects
    /// those tests.
    pub fn call(&self, subject: &Subject) -> Result<Vec<Test>> {
        let mut candidates: Vec<&Expression> = Vec::new();
        for test in &self.tests {
            if !candidates.contains(&&test.expression) {
                candidates.push(&test.expression);
            }
        }
        if let Some(best) = Expression::best_match(candidates, subject.expression())? {
            return Ok(self.select(|expression| expression == best));
        }

        for match_expression in subject.match_expressions() {
            let tests = self.select(|expression| match_expression.prefix(expression));
            if !tests.is_empty() {
                return Ok(tests);
            }
        }
        Ok(Vec::new())
    }

    fn select(&self, predicate: impl Fn(&Expression) -> bool) -> Vec<Test> {
        self.tests
            .iter()
            .filter(|test| predicate(&test.expression))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ProgramImage, Universe};
    use crate::sexp::read;
    use pretty_assertions::assert_eq;

    fn subject() -> Subject {
        let mut image = ProgramImage::new();
        image.load(
            "foo.sexp",
            read("(module (const nil :Foo) (class (const nil :Bar) nil (def :baz (args) nil)))")
                .unwrap(),
        );
        let universe = Universe::discover(&image);
        let scope = universe.scope("Foo::Bar").unwrap();
        let method = &scope.methods[0];
        Subject::new(scope, method, method.location.clone().unwrap())
    }

    fn test(id: &str, expression: &str) -> Test {
        Test {
            id: id.to_string(),
            expression: Expression::parse(expression).unwrap(),
        }
    }

    fn selected(tests: Vec<Test>) -> Vec<String> {
        Selector::new(tests)
            .call(&subject())
            .unwrap()
            .into_iter()
            .map(|test| test.id)
            .collect()
    }

    #[test]
    fn test_most_specific_tests_win() {
        assert_eq!(
            selected(vec![
                test("outer", "Foo*"),
                test("inner", "Foo::Bar*"),
                test("inner-2", "Foo::Bar*"),
                test("other", "Qux*"),
            ]),
            vec!["inner", "inner-2"]
        );
        assert_eq!(
            selected(vec![test("outer", "Foo*"), test("method", "Foo::Bar#baz")]),
            vec!["method"]
        );
    }

    #[test]
    fn test_falls_back_to_enclosing_scopes() {
        assert_eq!(
            selected(vec![test("namespace", "Foo::Bar"), test("other", "Foo::Qux")]),
            vec!["namespace"]
        );
        assert_eq!(
            selected(vec![test("outer", "Foo::Qux"), test("other", "Bar")]),
            vec!["outer"]
        );
    }

    #[test]
    fn test_no_matching_tests() {
        assert!(selected(vec![test("other", "Qux*")]).is_empty());
        assert!(selected(vec![]).is_empty());
    }
}
