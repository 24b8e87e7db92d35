//! Immutable descriptions of a requested search.

use std::rc::Rc;

use crate::node::{same_node, NodeRef};

/// A single search request: where to search, how long for, and which root
/// moves the engine may consider.
///
/// Values are immutable once constructed and shared behind `Rc`. Comparing
/// two requests with [`SearchParams::same`] is an identity test, not a
/// structural one: the driver relies on being able to distinguish a
/// halt-then-resume (two distinct values with equal settings) from a search
/// that was never replaced.
pub struct SearchParams {
    node: Option<NodeRef>,
    limit: Option<u64>,
    searchmoves: Vec<String>,
}

pub type ParamsRef = Rc<SearchParams>;

thread_local! {
    static NO_SEARCH: ParamsRef = Rc::new(SearchParams {
        node: None,
        limit: None,
        searchmoves: Vec::new(),
    });
}

/// The shared "nothing to search" value. Always the same allocation within a
/// thread, so identity comparisons against it are meaningful.
pub fn no_search() -> ParamsRef {
    NO_SEARCH.with(Rc::clone)
}

impl SearchParams {
    /// Build a new request. An empty `node` yields the [`no_search`]
    /// singleton without allocating. `searchmoves` is validated by the node
    /// and only moves it reports as legal are kept, in their original order;
    /// the caller's slice is never retained. A limit of zero is treated as
    /// no limit.
    pub fn new(node: Option<NodeRef>, limit: Option<u64>, searchmoves: &[String]) -> ParamsRef {
        let node = match node {
            Some(n) => n,
            None => return no_search(),
        };
        let searchmoves = node.validate_searchmoves(searchmoves);
        Rc::new(SearchParams {
            node: Some(node),
            limit: limit.filter(|&n| n > 0),
            searchmoves,
        })
    }

    pub fn node(&self) -> Option<&NodeRef> {
        self.node.as_ref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn searchmoves(&self) -> &[String] {
        &self.searchmoves
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    /// Identity comparison. See the type-level docs.
    pub fn same(a: &ParamsRef, b: &ParamsRef) -> bool {
        Rc::ptr_eq(a, b)
    }

    /// Structural comparison against another request: same node by identity,
    /// same limit, same searchmoves. Used to recognise a request the running
    /// search already satisfies.
    pub fn same_settings(&self, other: &SearchParams) -> bool {
        let nodes_match = match (&self.node, &other.node) {
            (Some(a), Some(b)) => same_node(a, b),
            (None, None) => true,
            _ => false,
        };
        nodes_match && self.limit == other.limit && self.searchmoves == other.searchmoves
    }
}
