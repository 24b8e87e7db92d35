use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// The slice of the hub's configuration the driver reads.
///
/// The hub owns the real configuration store; it hands the driver a
/// [`ConfigHandle`] and updates the cell in place when the user changes a
/// setting. Everything here is plain data, so the handle is a `Cell` rather
/// than anything heavier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log every outbound `position` command.
    pub log_positions: bool,

    /// Log every inbound `info` line (noisy).
    pub log_info_lines: bool,

    /// Interpret search limits as milliseconds (`go movetime`) rather than
    /// nodes (`go nodes`).
    pub use_movetime: bool,

    /// Allow restricting the engine to a subset of root moves via
    /// ` searchmoves …` on the go command.
    pub searchmoves_buttons: bool,
}

pub type ConfigHandle = Rc<Cell<Config>>;

pub fn shared(config: Config) -> ConfigHandle {
    Rc::new(Cell::new(config))
}
