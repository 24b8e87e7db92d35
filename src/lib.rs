pub mod classify;
pub mod config;
pub mod driver;
pub mod hub;
pub mod node;
pub mod options;
pub mod params;
pub mod transport;

pub use crate::config::{Config, ConfigHandle};
pub use crate::driver::{Driver, DriverError, DriverState, SearchPhase, STARTPOS_FEN};
pub use crate::hub::{HostChannel, Hub, InfoHandler, VariantFlag};
pub use crate::node::{same_node, GameNode, NodeRef};
pub use crate::options::OptionRegistry;
pub use crate::params::{no_search, ParamsRef, SearchParams};
pub use crate::transport::{EngineTransport, LineEvent, ProcessTransport};
