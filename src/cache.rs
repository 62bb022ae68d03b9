//! Parsed source cache

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Result;
use crate::node::NodeRef;

/// Turns a source file into a syntax tree
///
/// Implementations must be deterministic for a given file.
pub trait Parser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<NodeRef>;
}

/// Memoizing wrapper around a [`Parser`]
pub struct Cache<P> {
    parser: P,
    trees: Mutex<HashMap<PathBuf, NodeRef>>,
}

impl<P: Parser> Cache<P> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            trees: Mutex::new(HashMap::new()),
        }
    }

    /// Parse `path`, reusing the tree from an earlier call
    pub fn parse(&self, path: &Path) -> Result<NodeRef> {
        if let Some(tree) = self.trees.lock().get(path) {
            return Ok(NodeRef::clone(tree));
        }
        let tree = self.parser.parse(path)?;
        self.trees
            .lock()
            .insert(path.to_path_buf(), NodeRef::clone(&tree));
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingParser {
        calls: AtomicUsize,
    }

    impl Parser for CountingParser {
        fn parse(&self, _path: &Path) -> Result<NodeRef> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Node::int(1))
        }
    }

    #[test]
    fn test_parse_is_memoized_per_path() {
        let cache = Cache::new(CountingParser {
            calls: AtomicUsize::new(0),
        });
        let first = cache.parse(Path::new("a.sexp")).unwrap();
        let second = cache.parse(Path::new("a.sexp")).unwrap();
        cache.parse(Path::new("b.sexp")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.parser.calls.load(Ordering::SeqCst), 2);
    }
}
