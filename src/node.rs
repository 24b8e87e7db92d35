use std::rc::Rc;

/// The driver's view of a position in the hub's game tree.
///
/// The hub owns the tree and may mark a node destroyed at any moment, so
/// every use of a node starts by checking [`GameNode::destroyed`]. All chess
/// knowledge (legality, FEN, castling encodings) stays behind this trait; the
/// driver treats FEN strings and move tokens as opaque text.
pub trait GameNode {
    /// The hub has discarded this node. Searches referencing it are abandoned.
    fn destroyed(&self) -> bool;

    /// Checkmate or stalemate; there is nothing for an engine to search.
    fn terminal(&self) -> bool;

    /// FEN of the root position of the game this node belongs to.
    fn root_fen(&self) -> String;

    /// Move tokens from the game root to this node, in UCI long-algebraic
    /// form. With `chess960` set, castling is encoded as king-captures-own-
    /// rook; otherwise the classical king-to-rook-square convention is used.
    fn history_tokens(&self, chess960: bool) -> Vec<String>;

    /// Filter `moves` down to the ones legal in this position, preserving
    /// order. Returns a fresh sequence; the input is never retained.
    fn validate_searchmoves(&self, moves: &[String]) -> Vec<String>;
}

pub type NodeRef = Rc<dyn GameNode>;

/// Node identity. Compares the data pointers of the two `Rc`s, deliberately
/// ignoring vtable pointers, which can differ for the same object across
/// codegen units.
pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    Rc::as_ptr(a) as *const u8 == Rc::as_ptr(b) as *const u8
}

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// Minimal in-memory node for unit tests: a FEN, a move history, and a
    /// fixed legal-move list.
    pub struct StubNode {
        pub fen: String,
        pub history: Vec<String>,
        pub legal: Vec<String>,
        pub destroyed: std::cell::Cell<bool>,
        pub terminal: bool,
    }

    impl StubNode {
        pub fn at_fen(fen: &str) -> Rc<StubNode> {
            Rc::new(StubNode {
                fen: fen.to_string(),
                history: Vec::new(),
                legal: Vec::new(),
                destroyed: std::cell::Cell::new(false),
                terminal: false,
            })
        }
    }

    impl GameNode for StubNode {
        fn destroyed(&self) -> bool {
            self.destroyed.get()
        }

        fn terminal(&self) -> bool {
            self.terminal
        }

        fn root_fen(&self) -> String {
            self.fen.clone()
        }

        fn history_tokens(&self, _chess960: bool) -> Vec<String> {
            self.history.clone()
        }

        fn validate_searchmoves(&self, moves: &[String]) -> Vec<String> {
            moves
                .iter()
                .filter(|m| self.legal.contains(m))
                .cloned()
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::StubNode;
    use super::*;

    #[test]
    fn test_same_node_is_identity() {
        let a: NodeRef = StubNode::at_fen("8/8/8/8/8/8/8/8 w - - 0 1");
        let b: NodeRef = StubNode::at_fen("8/8/8/8/8/8/8/8 w - - 0 1");
        let a2 = a.clone();

        assert!(same_node(&a, &a2));
        assert!(!same_node(&a, &b));
    }
}
