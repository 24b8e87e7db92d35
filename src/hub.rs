//! The callback seams between the driver and its owner.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use crate::driver::DriverState;
use crate::node::NodeRef;

/// Callbacks into the hub, the application object that owns the driver.
pub trait Hub {
    /// A search concluded and its result is current: `line` is the raw
    /// `bestmove …` text and `node` the position it answers.
    ///
    /// Called at most once per search; bestmoves belonging to superseded or
    /// halted searches never arrive here.
    fn receive_bestmove(&mut self, line: &str, node: &NodeRef);

    /// Any stdout line the driver does not consume itself: handshake
    /// replies, `option` declarations, banners.
    fn receive_misc(&mut self, line: &str);

    /// A stderr line from the engine, already stripped of control characters.
    fn err_receive(&mut self, line: &str);

    /// A one-shot, user-facing warning (spawn failure, engine stopped
    /// accepting input).
    fn alert(&mut self, message: &str);
}

/// Consumer of surviving `info` lines. Parsing their content is entirely the
/// handler's business; the driver only decides whether a line is current.
pub trait InfoHandler {
    /// An info line that passed the driver's filters, attributed to the node
    /// of the search that produced it. `state` is a read-only view of the
    /// driver that delivered it: the driver cannot hand itself out while it
    /// is invoking the handler, but everything observable (cycle counters,
    /// the running/desired pair, handshake flags) is in the state.
    fn receive(&mut self, state: &DriverState, node: &NodeRef, line: &str);

    /// A new `go` was issued. The driver's cycle counters are pushed here so
    /// the handler can attribute analysis to the search that produced it.
    fn begin_cycle(&mut self, cycle: u64, subcycle: u64);
}

/// Acknowledgements to the host application's main process, which mirrors
/// engine state in its menus.
pub trait HostChannel {
    /// An engine subprocess was spawned from `path`.
    fn ack_engine_start(&mut self, path: &Path);

    /// An option value was recorded or re-asserted. `key` is lowercase;
    /// `value` is the empty string if nothing has been sent for that key.
    fn ack_setoption(&mut self, key: &str, value: &str);
}

/// One-shot latch recording that the engine speaks the Leela info dialect
/// (`VerboseMoveStats`).
///
/// The info handler sets it the first time it sees the token; the driver
/// reads it to route options and to decide whether post-`stop` info lines are
/// trustworthy. Clones share the underlying cell, so the flag can be handed
/// to both sides at construction. It is never reset.
#[derive(Clone, Debug, Default)]
pub struct VariantFlag(Rc<Cell<bool>>);

impl VariantFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_leelaish(&self) {
        self.0.set(true);
    }

    pub fn is_leelaish(&self) -> bool {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_flag_is_shared() {
        let flag = VariantFlag::new();
        let clone = flag.clone();

        assert!(!flag.is_leelaish());
        clone.mark_leelaish();
        assert!(flag.is_leelaish());
    }
}
