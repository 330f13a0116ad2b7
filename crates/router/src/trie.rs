//! Per-method route trie.
//!
//! Every HTTP method owns an independent tree whose edges are path segments
//! (see [`segment`]). A node holds literal children keyed by segment text and
//! at most one *reserved* child, stored under the empty key, which is either a
//! named parameter (`:name`) or a trailing wildcard (`*`).
//!
//! Matching is a single pass over the request segments. At every node the
//! reserved child is tried before the literal children, so a parameter or
//! wildcard always shadows a literal sibling:
//!
//! ```
//! use http::Method;
//! use micro_router::trie::{RouteMatch, RouteTrie};
//!
//! let mut trie = RouteTrie::new();
//! trie.insert(Method::GET, "/user/admin", "admin");
//! trie.insert(Method::GET, "/user/:name", "user");
//!
//! match trie.find(&Method::GET, "/user/admin") {
//!     RouteMatch::Found { handler, params } => {
//!         assert_eq!(*handler, "user");
//!         assert_eq!(params.string("name"), "admin");
//!     }
//!     _ => unreachable!(),
//! }
//! ```

use crate::path::{segment, WILDCARD};
use crate::PathParams;
use http::Method;
use std::collections::HashMap;
use std::fmt;

/// Key of the reserved parameter/wildcard child
const RESERVED: &str = "";

const PARAM_PREFIX: char = ':';

struct Node<H> {
    name: String,
    children: HashMap<String, Node<H>>,
    wildcard: bool,
    handler: Option<H>,
}

impl<H> Node<H> {
    fn literal() -> Self {
        Self { name: String::new(), children: HashMap::new(), wildcard: false, handler: None }
    }

    fn param(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::literal() }
    }

    fn wildcard(handler: H) -> Self {
        Self { name: WILDCARD.to_string(), children: HashMap::new(), wildcard: true, handler: Some(handler) }
    }

    #[inline]
    fn reserved(&self) -> Option<&Node<H>> {
        self.children.get(RESERVED)
    }
}

/// Outcome of [`RouteTrie::find`]
pub enum RouteMatch<'a, H> {
    /// A handler is registered for the path
    Found { handler: &'a H, params: PathParams },
    /// Nothing at all is registered for the method
    MethodNotFound,
    /// The request path could not be segmented
    InvalidPath,
    /// The walk failed or ended on a node without handler
    NotFound,
}

impl<H> fmt::Debug for RouteMatch<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found { params, .. } => f.debug_struct("Found").field("params", params).finish_non_exhaustive(),
            Self::MethodNotFound => f.write_str("MethodNotFound"),
            Self::InvalidPath => f.write_str("InvalidPath"),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Route trees keyed by HTTP method.
///
/// The trie is filled during configuration and only read while serving, so
/// lookups take `&self` and need no locking.
pub struct RouteTrie<H> {
    methods: HashMap<Method, Node<H>>,
}

impl<H> Default for RouteTrie<H> {
    fn default() -> Self {
        Self { methods: HashMap::new() }
    }
}

impl<H> fmt::Debug for RouteTrie<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTrie").field("methods", &self.methods.keys().collect::<Vec<_>>()).finish()
    }
}

impl<H> RouteTrie<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` and `path`.
    ///
    /// An invalid path is silently ignored. Registering the same path again
    /// replaces the handler. A `:name` segment reuses the reserved child of its
    /// position if one exists, keeping the name it was first registered with.
    /// A `*` segment ends the route: the segments following it are ignored.
    pub fn insert(&mut self, method: Method, path: &str, handler: H) {
        let Some(segments) = segment(path) else {
            return;
        };

        let mut node = self.methods.entry(method).or_insert_with(Node::literal);

        for item in &segments {
            if item == WILDCARD {
                match node.children.get_mut(RESERVED) {
                    Some(reserved) if reserved.wildcard => reserved.handler = Some(handler),
                    // a parameter already owns this position
                    Some(_) => {}
                    None => {
                        node.children.insert(RESERVED.to_string(), Node::wildcard(handler));
                    }
                }
                return;
            }

            node = match item.strip_prefix(PARAM_PREFIX) {
                Some(name) => node.children.entry(RESERVED.to_string()).or_insert_with(|| Node::param(name)),
                None => node.children.entry(item.to_string()).or_insert_with(Node::literal),
            };
        }

        node.handler = Some(handler);
    }

    /// Resolves `method` and `path` to a handler and its path parameters
    pub fn find(&self, method: &Method, path: &str) -> RouteMatch<'_, H> {
        let Some(mut node) = self.methods.get(method) else {
            return RouteMatch::MethodNotFound;
        };

        let Some(segments) = segment(path) else {
            return RouteMatch::InvalidPath;
        };

        let mut tail = String::new();
        let mut params = PathParams::empty();

        for item in &segments {
            if node.wildcard {
                tail.push('/');
                tail.push_str(item);
                continue;
            }

            if let Some(reserved) = node.reserved() {
                node = reserved;
                if node.wildcard {
                    tail.clear();
                    tail.push('/');
                    tail.push_str(item);
                } else {
                    params.insert(node.name.as_str(), &**item);
                }
                continue;
            }

            match node.children.get(&**item) {
                Some(child) => node = child,
                None => return RouteMatch::NotFound,
            }
        }

        if node.wildcard {
            params.insert(WILDCARD, tail);
        }

        match &node.handler {
            Some(handler) => RouteMatch::Found { handler, params },
            None => RouteMatch::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RouteMatch, RouteTrie};
    use crate::PathParams;
    use http::Method;

    fn trie() -> RouteTrie<&'static str> {
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "/", "root");
        trie.insert(Method::GET, "/user/:name", "user");
        trie.insert(Method::GET, "/user/:name/posts/:id", "user_post");
        trie.insert(Method::GET, "/tail/*", "tail");
        trie.insert(Method::GET, "/static/a/b", "static");
        trie.insert(Method::POST, "/user/:name", "create_user");
        trie
    }

    fn found(trie: &RouteTrie<&'static str>, method: Method, path: &str) -> Option<(&'static str, PathParams)> {
        match trie.find(&method, path) {
            RouteMatch::Found { handler, params } => Some((*handler, params)),
            _ => None,
        }
    }

    #[test]
    fn test_root() {
        let trie = trie();
        assert_eq!(found(&trie, Method::GET, "/").map(|f| f.0), Some("root"));
        assert_eq!(found(&trie, Method::GET, "//").map(|f| f.0), Some("root"));
    }

    #[test]
    fn test_named_param() {
        let trie = trie();

        let (handler, params) = found(&trie, Method::GET, "/user/alice").unwrap();
        assert_eq!(handler, "user");
        assert_eq!(params.string("name"), "alice");
        assert_eq!(params.len(), 1);

        let (_, params) = found(&trie, Method::GET, "/user/alice/").unwrap();
        assert_eq!(params.string("name"), "alice");

        let (handler, params) = found(&trie, Method::GET, "/user/bob/posts/17").unwrap();
        assert_eq!(handler, "user_post");
        assert_eq!(params.string("name"), "bob");
        assert_eq!(params.int("id"), 17);
    }

    #[test]
    fn test_param_is_decoded() {
        let trie = trie();
        let (_, params) = found(&trie, Method::GET, "/user/j%C3%BCrgen").unwrap();
        assert_eq!(params.string("name"), "jürgen");
    }

    #[test]
    fn test_wildcard_tail() {
        let trie = trie();

        let (handler, params) = found(&trie, Method::GET, "/tail/1/2/3").unwrap();
        assert_eq!(handler, "tail");
        assert_eq!(params.wildcard(), Some("/1/2/3"));

        let (_, params) = found(&trie, Method::GET, "/tail/1/11/111/").unwrap();
        assert_eq!(params.wildcard(), Some("/1/11/111"));

        let (_, params) = found(&trie, Method::GET, "/tail/1").unwrap();
        assert_eq!(params.wildcard(), Some("/1"));
    }

    #[test]
    fn test_wildcard_without_tail_is_not_found() {
        let trie = trie();
        assert!(matches!(trie.find(&Method::GET, "/tail/"), RouteMatch::NotFound));
        assert!(matches!(trie.find(&Method::GET, "/tail"), RouteMatch::NotFound));
    }

    #[test]
    fn test_intermediate_node_is_not_found() {
        let trie = trie();
        assert!(matches!(trie.find(&Method::GET, "/static/a"), RouteMatch::NotFound));
        assert!(matches!(trie.find(&Method::GET, "/user"), RouteMatch::NotFound));
        assert!(matches!(trie.find(&Method::GET, "/unknown"), RouteMatch::NotFound));
        assert!(matches!(trie.find(&Method::GET, "/static/a/b/c"), RouteMatch::NotFound));
    }

    #[test]
    fn test_method_and_path_errors() {
        let trie = trie();
        assert!(matches!(trie.find(&Method::DELETE, "/"), RouteMatch::MethodNotFound));
        assert!(matches!(trie.find(&Method::GET, "/bad/%zz"), RouteMatch::InvalidPath));
        assert!(matches!(trie.find(&Method::GET, "relative"), RouteMatch::InvalidPath));
    }

    #[test]
    fn test_methods_are_independent() {
        let trie = trie();
        assert_eq!(found(&trie, Method::POST, "/user/carol").map(|f| f.0), Some("create_user"));
        assert!(found(&trie, Method::POST, "/").is_none());
    }

    #[test]
    fn test_param_shadows_literal() {
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "/item/new", "literal");
        trie.insert(Method::GET, "/item/:id", "param");

        for value in ["new", "42", "other"] {
            let (handler, params) = found(&trie, Method::GET, &format!("/item/{value}")).unwrap();
            assert_eq!(handler, "param");
            assert_eq!(params.string("id"), value);
        }

        // registration order does not matter
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "/item/:id", "param");
        trie.insert(Method::GET, "/item/new", "literal");
        assert_eq!(found(&trie, Method::GET, "/item/new").map(|f| f.0), Some("param"));
    }

    #[test]
    fn test_wildcard_shadows_literal() {
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "/files/readme", "literal");
        trie.insert(Method::GET, "/files/*", "wildcard");

        let (handler, params) = found(&trie, Method::GET, "/files/readme").unwrap();
        assert_eq!(handler, "wildcard");
        assert_eq!(params.wildcard(), Some("/readme"));
    }

    #[test]
    fn test_wildcard_after_param_is_ignored() {
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "/user/:name", "param");
        trie.insert(Method::GET, "/user/*", "wildcard");

        let (handler, params) = found(&trie, Method::GET, "/user/ann").unwrap();
        assert_eq!(handler, "param");
        assert_eq!(params.string("name"), "ann");
        assert_eq!(params.wildcard(), None);
        assert!(found(&trie, Method::GET, "/user/ann/photos").is_none());
    }

    #[test]
    fn test_first_param_name_wins() {
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "/user/:name", "first");
        trie.insert(Method::GET, "/user/:login", "second");

        let (handler, params) = found(&trie, Method::GET, "/user/dave").unwrap();
        assert_eq!(handler, "second");
        assert_eq!(params.string("name"), "dave");
        assert_eq!(params.get("login"), None);
    }

    #[test]
    fn test_empty_param_name() {
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "/anon/:", "anon");

        let (_, params) = found(&trie, Method::GET, "/anon/value").unwrap();
        assert_eq!(params.string(""), "value");
    }

    #[test]
    fn test_reregister_overwrites_handler() {
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "/page", "v1");
        trie.insert(Method::GET, "/page/", "v2");
        trie.insert(Method::GET, "/tail/*", "t1");
        trie.insert(Method::GET, "/tail/*", "t2");

        assert_eq!(found(&trie, Method::GET, "/page").map(|f| f.0), Some("v2"));
        assert_eq!(found(&trie, Method::GET, "/tail/x").map(|f| f.0), Some("t2"));
    }

    #[test]
    fn test_segments_after_wildcard_are_ignored() {
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "/docs/*/ignored", "docs");

        let (handler, params) = found(&trie, Method::GET, "/docs/a/b").unwrap();
        assert_eq!(handler, "docs");
        assert_eq!(params.wildcard(), Some("/a/b"));
    }

    #[test]
    fn test_invalid_registration_is_ignored() {
        let mut trie = RouteTrie::new();
        trie.insert(Method::GET, "no-slash", "bad");
        trie.insert(Method::PUT, "/bad/%zz", "bad");

        assert!(matches!(trie.find(&Method::GET, "/no-slash"), RouteMatch::MethodNotFound));
        assert!(matches!(trie.find(&Method::PUT, "/"), RouteMatch::MethodNotFound));
    }
}
