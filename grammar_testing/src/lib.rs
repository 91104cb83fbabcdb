//! Test support shared by the `egt*` crates: an encoder for binary grammar tables, a handful of
//! fixture grammars, and a RON representation of expected trees and parse outcomes.

use ron::Options;
use ron::error::SpannedError;
use ron::extensions::Extensions;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

pub mod fixtures;
pub mod writer;

pub use writer::{Atom, TableBuilder, Value};

/// A tree in a form that is easy to write by hand: terminals are `(symbol id, lexeme)` and
/// non-terminals are `(production id, [children])`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(untagged)]
pub enum ASTRepr {
    Term(String, String),
    Nonterm(String, Vec<ASTRepr>),
}

impl ASTRepr {
    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, pretty_config())
    }

    pub fn from_ron_str<S: AsRef<str>>(s: S) -> Result<Self, SpannedError> {
        Options::default().from_str(s.as_ref())
    }
}

fn pretty_config() -> PrettyConfig {
    PrettyConfig::new().extensions(Extensions::IMPLICIT_SOME)
}

/// The expected outcome of parsing `input`. `tree`, when present, is the simplified tree; `errors`,
/// when present, are the rendered parse errors.
#[derive(Deserialize, Serialize, PartialEq, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub enum Test {
    TestError {
        input: String,
        errors: Option<Vec<String>>,
    },
    TestSuccess {
        input: String,
        tree: Option<ASTRepr>,
    },
}

impl Test {
    pub fn input(&self) -> &str {
        match self {
            Test::TestError { input, .. } | Test::TestSuccess { input, .. } => input,
        }
    }

    pub fn should_pass(&self) -> bool {
        matches!(self, Test::TestSuccess { .. })
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
#[serde(transparent)]
pub struct Tests(Vec<Test>);

impl Tests {
    pub fn from_ron_str<S: AsRef<str>>(s: S) -> Result<Self, SpannedError> {
        Options::default().from_str(s.as_ref())
    }
}

impl std::ops::Deref for Tests {
    type Target = Vec<Test>;

    fn deref(&self) -> &Vec<Test> {
        &self.0
    }
}

impl IntoIterator for Tests {
    type Item = Test;
    type IntoIter = std::vec::IntoIter<Test>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{ASTRepr, Test, Tests};

    #[test]
    fn input_only() {
        let input = r#"
            #![enable(implicit_some)]
            TestSuccess(input: "[a]")
        "#;
        let x: Test = ron::from_str(input).unwrap();
        assert_eq!(
            x,
            Test::TestSuccess {
                input: "[a]".to_string(),
                tree: None,
            }
        );
    }

    #[test]
    fn input_and_tree() {
        let input = r#"
        #![enable(implicit_some)]
        [
            TestSuccess(input: "[a]", tree: ("<List> ::= [ <List1> ]", [("Id", "a")])),
            TestError(input: "[", errors: ["SyntaxError(1:2) Token=(EOF) '' ExpectedTokens=[Id]"]),
        ]
        "#;
        let xs = Tests::from_ron_str(input).unwrap();
        assert!(xs[0].should_pass());
        assert!(!xs[1].should_pass());
        assert_eq!(xs[1].input(), "[");
        assert_eq!(
            xs[0],
            Test::TestSuccess {
                input: "[a]".to_string(),
                tree: Some(ASTRepr::Nonterm(
                    "<List> ::= [ <List1> ]".to_string(),
                    vec![ASTRepr::Term("Id".to_string(), "a".to_string())]
                ))
            }
        );
    }

    #[test]
    fn tree_survives_pretty_printing() {
        let t = ASTRepr::Nonterm(
            "<E> ::= <E> + <M>".to_string(),
            vec![
                ASTRepr::Term("Num".to_string(), "1".to_string()),
                ASTRepr::Term("Num".to_string(), "2".to_string()),
            ],
        );
        let s = t.to_ron_string().unwrap();
        assert_eq!(ASTRepr::from_ron_str(s).unwrap(), t);
    }
}
