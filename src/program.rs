//! Program image and the universe of matchable scopes
//!
//! A [`ProgramImage`] is a versioned snapshot of every loaded file. Inserting
//! a node yields a new image and leaves the original untouched, so the image
//! a mutation was applied to never needs to be restored.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{MutantError, Result};
use crate::expression::{Expression, ScopeSymbol};
use crate::node::{Node, NodeRef};

/// File path plus child-index path from the file root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub node_path: Vec<usize>,
}

impl SourceLocation {
    pub fn new(path: impl Into<PathBuf>, node_path: Vec<usize>) -> Self {
        Self {
            path: path.into(),
            node_path,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if !self.node_path.is_empty() {
            let segments: Vec<String> = self.node_path.iter().map(|i| i.to_string()).collect();
            write!(f, "@{}", segments.join("."))?;
        }
        Ok(())
    }
}

/// Versioned map of file path to syntax tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramImage {
    version: u64,
    files: BTreeMap<PathBuf, NodeRef>,
}

impl ProgramImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a loaded file
    pub fn load(&mut self, path: impl Into<PathBuf>, root: NodeRef) {
        self.files.insert(path.into(), root);
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, path: &Path) -> Option<&NodeRef> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &NodeRef)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Node at `location`, if the location resolves in this image
    pub fn node_at(&self, location: &SourceLocation) -> Option<&Node> {
        self.files.get(&location.path)?.descendant(&location.node_path)
    }

    /// New image with the node at `location` replaced by `node`
    pub fn insert(&self, location: &SourceLocation, node: NodeRef) -> Result<ProgramImage> {
        let invalid = || MutantError::InvalidLocation {
            file: location.path.clone(),
            node_path: location.node_path.clone(),
        };
        let root = self.files.get(&location.path).ok_or_else(invalid)?;
        let rebuilt = root
            .replace_descendant(&location.node_path, node)
            .ok_or_else(invalid)?;

        let mut files = self.files.clone();
        files.insert(location.path.clone(), Arc::new(rebuilt));
        Ok(ProgramImage {
            version: self.version + 1,
            files,
        })
    }
}

/// How a method is bound to its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Instance,
    Singleton,
}

impl MethodKind {
    pub fn symbol(self) -> ScopeSymbol {
        match self {
            MethodKind::Instance => ScopeSymbol::Instance,
            MethodKind::Singleton => ScopeSymbol::Singleton,
        }
    }
}

/// A method found in a scope
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    pub name: String,
    pub kind: MethodKind,
    /// The `def` or `defs` node
    pub node: NodeRef,
    pub location: Option<SourceLocation>,
    /// Defined through a block rather than directly in the scope body
    pub within_block: bool,
}

/// A module or class with the methods defined in it
#[derive(Debug, Clone, PartialEq)]
pub struct MatchableScope {
    pub name: String,
    pub expression: Expression,
    pub methods: Vec<MethodDefinition>,
}

impl MatchableScope {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            expression: Expression::namespace(name),
            methods: Vec::new(),
        }
    }

    pub fn method_expression(&self, method: &MethodDefinition) -> Expression {
        Expression::method(&self.name, method.kind.symbol(), &method.name)
    }

    /// Record a method, replacing an earlier definition of the same method
    fn define(&mut self, method: MethodDefinition) {
        let existing = self
            .methods
            .iter_mut()
            .find(|m| m.name == method.name && m.kind == method.kind);
        match existing {
            Some(existing) => *existing = method,
            None => self.methods.push(method),
        }
    }
}

/// All matchable scopes, sorted by expression syntax
#[derive(Debug, Clone, Default)]
pub struct Universe {
    scopes: Vec<MatchableScope>,
}

impl Universe {
    pub fn new(mut scopes: Vec<MatchableScope>) -> Self {
        scopes.sort_by_key(|scope| scope.expression.syntax());
        Self { scopes }
    }

    /// Collect modules, classes and their methods from every file
    pub fn discover(image: &ProgramImage) -> Self {
        let mut scopes: BTreeMap<String, MatchableScope> = BTreeMap::new();
        for (path, root) in image.files() {
            let mut walker = Walker {
                path,
                node_path: Vec::new(),
                scopes: &mut scopes,
            };
            walker.walk(root, None, false);
        }
        Self::new(scopes.into_values().collect())
    }

    pub fn scopes(&self) -> &[MatchableScope] {
        &self.scopes
    }

    pub fn scope(&self, name: &str) -> Option<&MatchableScope> {
        self.scopes.iter().find(|scope| scope.name == name)
    }
}

struct Walker<'a> {
    path: &'a Path,
    node_path: Vec<usize>,
    scopes: &'a mut BTreeMap<String, MatchableScope>,
}

impl Walker<'_> {
    fn walk(&mut self, node: &Node, scope: Option<&str>, within_block: bool) {
        match node {
            Node::Module { name, body } => {
                self.enter_scope(name, body.as_ref(), 1, scope);
            }
            Node::Class {
                name,
                superclass,
                body,
            } => {
                let body_index = if superclass.is_some() { 2 } else { 1 };
                self.enter_scope(name, body.as_ref(), body_index, scope);
            }
            Node::Begin(statements) => {
                for (index, statement) in statements.iter().enumerate() {
                    self.child(index, statement, scope, within_block);
                }
            }
            Node::Block { body: Some(body), .. } => {
                self.child(1, body, scope, true);
            }
            Node::Def { name, .. } => {
                self.define(scope, node, name, MethodKind::Instance, within_block)
            }
            Node::Defs {
                singleton, name, ..
            } if **singleton == Node::SelfRef => {
                self.define(scope, node, name, MethodKind::Singleton, within_block)
            }
            _ => {}
        }
    }

    fn child(&mut self, index: usize, node: &Node, scope: Option<&str>, within_block: bool) {
        self.node_path.push(index);
        self.walk(node, scope, within_block);
        self.node_path.pop();
    }

    fn enter_scope(
        &mut self,
        name: &NodeRef,
        body: Option<&NodeRef>,
        body_index: usize,
        outer: Option<&str>,
    ) {
        let Some(name) = name.const_name() else {
            return;
        };
        let qualified = match outer {
            Some(outer) => format!("{}::{}", outer, name),
            None => name,
        };
        self.scopes
            .entry(qualified.clone())
            .or_insert_with(|| MatchableScope::new(&qualified));
        if let Some(body) = body {
            self.child(body_index, body, Some(&qualified), false);
        }
    }

    fn define(
        &mut self,
        scope: Option<&str>,
        node: &Node,
        name: &str,
        kind: MethodKind,
        within_block: bool,
    ) {
        // Methods outside any module or class are not matchable
        let Some(scope) = scope.and_then(|scope| self.scopes.get_mut(scope)) else {
            return;
        };
        scope.define(MethodDefinition {
            name: name.to_string(),
            kind,
            node: Arc::new(node.clone()),
            location: Some(SourceLocation::new(self.path, self.node_path.clone())),
            within_block,
        });
    }
}
