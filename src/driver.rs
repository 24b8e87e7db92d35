//! The driver proper: the search-lifecycle state machine and the facade the
//! hub holds.
//!
//! The awkward part of UCI is that control only comes back on the engine's
//! schedule: after a `go`, nothing but a `bestmove` ends the search, and a
//! `stop` merely requests one. Meanwhile the user keeps clicking. The driver
//! therefore tracks three searches at once (`running` in the engine, the one
//! the hub currently wants as `desired`, and the one `completed` by the most
//! recent bestmove) and reconciles them every time a line arrives.

use std::path::Path;
use std::time::Instant;

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::classify::{classify, mentions_chess960, sanitize, LineClass};
use crate::config::ConfigHandle;
use crate::hub::{HostChannel, Hub, InfoHandler, VariantFlag};
use crate::node::{same_node, NodeRef};
use crate::options::{parse_setoption, suppressed_for_variant, OptionRegistry, RESET_ACK_OPTIONS};
use crate::params::{no_search, ParamsRef, SearchParams};
use crate::transport::{EngineTransport, LineEvent, ProcessTransport, TransportError};

pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Error)]
pub enum DriverError {
    /// The option does not apply to the loaded engine's variant and was not
    /// sent. The previously recorded value has been re-acked to the host.
    #[error("option {name:?} was not sent: {reason}")]
    OptionSuppressed { name: String, reason: &'static str },
}

/// The search lifecycle, read off the {running, desired} pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchPhase {
    /// Nothing running, nothing wanted.
    Inactive,

    /// The wanted search is executing; its bestmove will be forwarded.
    Running,

    /// A search is executing but a different one is wanted. A `stop` is
    /// outstanding; the stale bestmove will be discarded and the wanted
    /// search launched.
    Changing,

    /// A search is executing and none is wanted. A `stop` is outstanding;
    /// the bestmove will be discarded.
    Ending,
}

pub struct DriverState {
    /// What the engine is currently searching (possibly nothing).
    pub running: ParamsRef,

    /// What the hub wants to be searching.
    pub desired: ParamsRef,

    /// What was running when the most recent bestmove arrived.
    pub completed: ParamsRef,

    pub received_uciok: bool,
    pub received_readyok: bool,
    pub quit_requested: bool,
    pub warned_send_failure: bool,

    /// The last line successfully written to the engine.
    pub last_send: Option<String>,

    /// When the outstanding `stop` was sent, if one is. Observable state for
    /// external watchdogs; the driver itself never reads it.
    pub unresolved_stop_time: Option<Instant>,

    /// If set, info lines from this cycle are dropped ("forget all
    /// analysis"). Always a cycle that has already occurred.
    pub suppress_cycle_info: Option<u64>,

    /// Incremented on every `go`. Info lines are attributed to the cycle of
    /// the search that produced them.
    pub cycle: u64,

    /// Mirrors `cycle` here; a richer info handler may let them diverge.
    pub subcycle: u64,
}

impl DriverState {
    fn new() -> Self {
        Self {
            running: no_search(),
            desired: no_search(),
            completed: no_search(),
            received_uciok: false,
            received_readyok: false,
            quit_requested: false,
            warned_send_failure: false,
            last_send: None,
            unresolved_stop_time: None,
            suppress_cycle_info: None,
            cycle: 0,
            subcycle: 0,
        }
    }

    pub fn phase(&self) -> SearchPhase {
        if self.running.is_empty() {
            SearchPhase::Inactive
        } else if SearchParams::same(&self.running, &self.desired) {
            SearchPhase::Running
        } else if self.desired.is_empty() {
            SearchPhase::Ending
        } else {
            SearchPhase::Changing
        }
    }

    fn handshaken(&self) -> bool {
        self.received_uciok && self.received_readyok
    }
}

/// One engine subprocess and the state machine that keeps it coherent.
///
/// Single-use: after [`Driver::shutdown`] the instance is inert and a new
/// engine means a new driver. All methods run on the hub's event loop; the
/// hub pumps [`Driver::events`] and feeds each event to
/// [`Driver::handle_event`].
pub struct Driver {
    state: DriverState,
    registry: OptionRegistry,
    transport: Option<Box<dyn EngineTransport>>,
    events: Option<Receiver<LineEvent>>,
    hub: Box<dyn Hub>,
    info: Box<dyn InfoHandler>,
    host: Box<dyn HostChannel>,
    variant: VariantFlag,
    config: ConfigHandle,
}

impl Driver {
    pub fn new(
        hub: Box<dyn Hub>,
        info: Box<dyn InfoHandler>,
        host: Box<dyn HostChannel>,
        variant: VariantFlag,
        config: ConfigHandle,
    ) -> Self {
        Self {
            state: DriverState::new(),
            registry: OptionRegistry::new(),
            transport: None,
            events: None,
            hub,
            info,
            host,
            variant,
            config,
        }
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn registry(&self) -> &OptionRegistry {
        &self.registry
    }

    /// The inbound line events, once an engine is attached. The hub owns the
    /// loop: clone the receiver, select on it, feed everything to
    /// [`Driver::handle_event`].
    pub fn events(&self) -> Option<&Receiver<LineEvent>> {
        self.events.as_ref()
    }

    /// Spawn the engine and wire it up. On failure the user is alerted once
    /// and the driver stays engine-less (sends become registry-only no-ops).
    pub fn setup(&mut self, exe: &Path, args: &[String]) -> Result<(), TransportError> {
        let (transport, events) = match ProcessTransport::launch(exe, args) {
            Ok(pair) => pair,
            Err(err) => {
                log::warn!("{}", err);
                self.hub
                    .alert(&format!("Failed to start the engine: {}", err));
                return Err(err);
            }
        };
        log::info!("launched engine {:?}", exe);
        self.attach_transport(Box::new(transport), Some(events));
        self.host.ack_engine_start(exe);
        Ok(())
    }

    /// Attach an already-built transport. A fresh engine has been told
    /// nothing: the registry is cleared and the well-known option names are
    /// re-acked empty so the host's menus reset.
    pub fn attach_transport(
        &mut self,
        transport: Box<dyn EngineTransport>,
        events: Option<Receiver<LineEvent>>,
    ) {
        self.transport = Some(transport);
        self.events = events;
        self.registry.forget_all();
        for name in RESET_ACK_OPTIONS {
            self.host.ack_setoption(name, "");
        }
    }

    /// Tell the driver what should be searching. This is the only search
    /// control the hub has; halting is requesting an empty search, and
    /// cancelling a pending change is requesting something else.
    ///
    /// No-op before the `uciok`/`readyok` handshakes (the hub retries), and
    /// when the request matches the running search's settings exactly.
    pub fn set_search_desired(
        &mut self,
        node: Option<NodeRef>,
        limit: Option<u64>,
        searchmoves: &[String],
    ) {
        if !self.state.handshaken() {
            log::debug!("set_search_desired before handshake complete, dropped");
            return;
        }

        let params = SearchParams::new(node, limit, searchmoves);

        if self.state.running.is_empty() {
            self.state.desired = params;
            self.send_desired();
            return;
        }

        // A stop is outstanding iff the running search has already been
        // disowned. In that case only `desired` moves; the engine's reply to
        // the one stop already in flight drives the rest.
        let stop_outstanding = !SearchParams::same(&self.state.running, &self.state.desired);

        if !stop_outstanding && params.same_settings(&self.state.running) {
            // The running search already satisfies this request.
            return;
        }

        self.state.desired = params;

        if !stop_outstanding {
            self.send_raw("stop", false);
            if self.state.unresolved_stop_time.is_none() {
                self.state.unresolved_stop_time = Some(Instant::now());
            }
        }
    }

    /// Launch the desired search. Precondition: nothing is running.
    fn send_desired(&mut self) {
        assert!(
            self.state.running.is_empty(),
            "send_desired called while a search is still running"
        );

        let desired = self.state.desired.clone();
        let node = match desired.node() {
            Some(node) => node.clone(),
            None => {
                self.state.running = no_search();
                self.state.desired = no_search();
                return;
            }
        };

        if node.destroyed() || node.terminal() {
            // The hub discarded the node while we were getting here, or
            // there is nothing to search. Abandon quietly.
            self.state.running = no_search();
            self.state.desired = no_search();
            return;
        }

        let chess960 = self.registry.in_960_mode();

        let fen = node.root_fen();
        let mut position = String::from("position ");
        if !chess960 && fen == STARTPOS_FEN {
            position.push_str("startpos");
        } else {
            position.push_str("fen ");
            position.push_str(&fen);
        }
        let history = node.history_tokens(chess960);
        if !history.is_empty() {
            position.push_str(" moves");
            for token in &history {
                position.push(' ');
                position.push_str(token);
            }
        }
        if self.config.get().log_positions {
            log::info!("{}", position);
        }
        self.send_raw(&position, false);

        let config = self.config.get();
        let mut go = match desired.limit() {
            None => String::from("go infinite"),
            Some(n) if config.use_movetime => format!("go movetime {}", n),
            Some(n) => format!("go nodes {}", n),
        };
        if config.searchmoves_buttons && !desired.searchmoves().is_empty() {
            go.push_str(" searchmoves");
            for token in desired.searchmoves() {
                go.push(' ');
                go.push_str(token);
            }
        }
        self.send_raw(&go, false);

        self.state.running = desired;
        self.state.suppress_cycle_info = None;
        self.state.cycle += 1;
        self.state.subcycle += 1;
        self.info.begin_cycle(self.state.cycle, self.state.subcycle);
    }

    /// Feed one transport event through the machine. After `shutdown`
    /// everything inbound is ignored.
    pub fn handle_event(&mut self, event: LineEvent) {
        if self.state.quit_requested {
            return;
        }
        match event {
            // Windows engines terminate lines with \r\n.
            LineEvent::Stdout(line) => self.on_stdout(line.trim_end()),
            LineEvent::Stderr(line) => self.hub.err_receive(&sanitize(&line)),
            LineEvent::Closed => log::info!("engine stdout closed"),
        }
    }

    fn on_stdout(&mut self, line: &str) {
        match classify(line) {
            LineClass::BestMove => self.on_bestmove(line),
            LineClass::Info => self.on_info(line),
            LineClass::Option => {
                if mentions_chess960(line) {
                    // Always drive 960-capable engines in 960 encoding; the
                    // position setup degrades gracefully for normal chess.
                    self.setoption("UCI_Chess960", "true");
                }
                self.hub.receive_misc(line);
            }
            LineClass::UciOk => {
                self.state.received_uciok = true;
                self.hub.receive_misc(line);
            }
            LineClass::ReadyOk => {
                self.state.received_readyok = true;
                self.hub.receive_misc(line);
            }
            LineClass::Misc => self.hub.receive_misc(line),
        }
    }

    /// A search ended. Exactly one of three things happens: the result is
    /// forwarded (it answers the search the hub still wants), or it is
    /// dropped and the now-wanted search is launched, or it is dropped and
    /// the engine goes idle.
    fn on_bestmove(&mut self, line: &str) {
        if self.state.running.is_empty() {
            log::debug!("(unexpected bestmove) {}", line);
            return;
        }

        let finished = self.state.running.clone();
        self.state.completed = finished.clone();
        self.state.running = no_search();
        self.state.unresolved_stop_time = None;

        // Option writes deferred during the search go out now, before any
        // relaunch, in their original order.
        self.drain_pending();

        if SearchParams::same(&self.state.desired, &self.state.completed) {
            self.state.desired = no_search();
            if let Some(node) = finished.node() {
                self.hub.receive_bestmove(line, node);
            }
        } else if self.state.desired.is_empty() {
            log::debug!("(ignore halted) {}", line);
            self.state.desired = no_search();
        } else {
            log::debug!("(ignore old) {}", line);
            self.send_desired();
        }
    }

    fn on_info(&mut self, line: &str) {
        if self.config.get().log_info_lines {
            log::debug!("<-- {}", line);
        }

        let running = self.state.running.clone();
        let node = match running.node() {
            Some(node) => node,
            None => {
                log::debug!("(ignore info, no search) {}", line);
                return;
            }
        };

        if node.destroyed() {
            log::debug!("(ignore info, node destroyed) {}", line);
            return;
        }

        // Alpha-beta engines flush a garbage-short PV right after a stop;
        // while a change or halt is pending, their info is not attributable.
        // Leela-like engines keep reporting the true position, so theirs is.
        if !self.variant.is_leelaish() {
            let desired_matches = match self.state.desired.node() {
                Some(desired_node) => same_node(desired_node, node),
                None => false,
            };
            if !desired_matches {
                log::debug!("(ignore info, search transition) {}", line);
                return;
            }
        }

        if self.state.suppress_cycle_info == Some(self.state.cycle) {
            log::debug!("(ignore info, suppressed cycle) {}", line);
            return;
        }

        self.info.receive(&self.state, node, line);
    }

    /// Outbound discipline. `setoption` lines are deferred while a search
    /// runs (unless `force`, used only by the drain) and recorded/acked when
    /// they do go out. With no engine attached the registry is still
    /// updated, so the host keeps tracking intended values.
    fn send_raw(&mut self, line: &str, force: bool) {
        let line = line.trim_end();

        if line.starts_with("setoption") {
            if !self.state.running.is_empty() && !force {
                self.registry.queue(line.to_string());
                return;
            }
            if let Some((key, value)) = parse_setoption(line) {
                self.registry.record(&key, &value);
                self.host.ack_setoption(&key, &value);
            }
        }

        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => return,
        };

        match transport.send_line(line) {
            Ok(()) => {
                log::debug!("--> {}", line);
                self.state.last_send = Some(line.to_string());
            }
            Err(err) => {
                log::warn!("failed to send {:?} to engine: {}", line, err);
                if self.state.last_send.is_some() && !self.state.warned_send_failure {
                    self.state.warned_send_failure = true;
                    self.hub
                        .alert("The engine stopped accepting input. It may have crashed.");
                }
            }
        }
    }

    fn drain_pending(&mut self) {
        for line in self.registry.take_pending() {
            self.send_raw(&line, true);
        }
    }

    /// Raw-line escape hatch for commands the driver does not model, most
    /// importantly the `uci` / `isready` handshake.
    pub fn send(&mut self, line: &str) {
        self.send_raw(line, false);
    }

    pub fn setoption(&mut self, name: &str, value: &str) {
        self.send_raw(&format!("setoption name {} value {}", name, value), false);
    }

    /// Button-style options carry no value: `setoption name <name>`.
    pub fn pressbutton(&mut self, name: &str) {
        self.send_raw(&format!("setoption name {}", name), false);
    }

    /// Like [`Driver::setoption`], but consults the variant deny lists
    /// first. A suppressed option is not sent; the previously recorded value
    /// is re-acked so the host's UI snaps back, and the reason is returned.
    pub fn maybe_setoption(&mut self, name: &str, value: &str) -> Result<(), DriverError> {
        let key = name.to_ascii_lowercase();
        if let Some(reason) = suppressed_for_variant(&key, self.variant.is_leelaish()) {
            let previous = self.registry.value(&key).unwrap_or("").to_string();
            self.host.ack_setoption(&key, &previous);
            log::info!("withholding option {:?} from this engine: {}", name, reason);
            return Err(DriverError::OptionSuppressed {
                name: name.to_string(),
                reason,
            });
        }
        self.setoption(name, value);
        Ok(())
    }

    /// Send `ucinewgame`. The caller halts any search first; before the
    /// handshakes this is a logged no-op the hub will retry.
    pub fn send_ucinewgame(&mut self) {
        if !self.state.handshaken() {
            log::debug!("ucinewgame before handshake complete, dropped");
            return;
        }
        self.send_raw("ucinewgame", false);
    }

    /// Silence the rest of the current search's info stream. Analysis from
    /// the next `go` flows again.
    pub fn forget_analysis(&mut self) {
        if self.state.cycle > 0 {
            self.state.suppress_cycle_info = Some(self.state.cycle);
        }
    }

    /// Ask the engine to quit, give it the grace period, then kill it. The
    /// driver ignores all further input and output; it is single-use.
    pub fn shutdown(&mut self) {
        if self.state.quit_requested {
            return;
        }
        self.state.quit_requested = true;
        self.send_raw("quit", false);
        if let Some(transport) = self.transport.take() {
            transport.shutdown();
        }
        self.events = None;
    }
}
