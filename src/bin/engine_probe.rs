use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use tiller::{
    config, Config, Driver, DriverState, GameNode, HostChannel, Hub, InfoHandler, LineEvent,
    NodeRef, VariantFlag,
};

/// A node with no game tree behind it: one FEN, no history. The probe has no
/// chess model, so it never offers searchmoves and validates none.
struct ProbeNode {
    fen: String,
}

impl GameNode for ProbeNode {
    fn destroyed(&self) -> bool {
        false
    }

    fn terminal(&self) -> bool {
        false
    }

    fn root_fen(&self) -> String {
        self.fen.clone()
    }

    fn history_tokens(&self, _chess960: bool) -> Vec<String> {
        Vec::new()
    }

    fn validate_searchmoves(&self, _moves: &[String]) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Default)]
struct Progress {
    uciok: bool,
    readyok: bool,
    bestmove: Option<String>,
}

struct ProbeHub {
    progress: Rc<RefCell<Progress>>,
}

impl Hub for ProbeHub {
    fn receive_bestmove(&mut self, line: &str, _node: &NodeRef) {
        println!("{}", line);
        self.progress.borrow_mut().bestmove = Some(line.to_string());
    }

    fn receive_misc(&mut self, line: &str) {
        log::debug!("<-- {}", line);
        match line.trim() {
            "uciok" => self.progress.borrow_mut().uciok = true,
            "readyok" => self.progress.borrow_mut().readyok = true,
            _ => (),
        }
    }

    fn err_receive(&mut self, line: &str) {
        log::warn!("engine stderr: {}", line);
    }

    fn alert(&mut self, message: &str) {
        eprintln!("warning: {}", message);
    }
}

struct ProbeInfo {
    variant: VariantFlag,
    show: bool,
}

impl InfoHandler for ProbeInfo {
    fn receive(&mut self, _state: &DriverState, _node: &NodeRef, line: &str) {
        if line.contains("VerboseMoveStats") {
            self.variant.mark_leelaish();
        }
        if self.show {
            println!("{}", line);
        }
    }

    fn begin_cycle(&mut self, cycle: u64, _subcycle: u64) {
        log::debug!("search cycle {} started", cycle);
    }
}

struct ProbeHost;

impl HostChannel for ProbeHost {
    fn ack_engine_start(&mut self, path: &Path) {
        log::info!("engine started: {:?}", path);
    }

    fn ack_setoption(&mut self, key: &str, value: &str) {
        log::debug!("option acked: {} = {:?}", key, value);
    }
}

/// Launch a UCI engine, run a single search, and print what comes back
#[derive(Parser, Debug)]
#[clap(about, version, name = "engine_probe")]
struct Args {
    /// Path to the engine executable
    #[clap(long)]
    engine: PathBuf,

    /// Extra argument passed to the engine (repeatable)
    #[clap(long)]
    engine_arg: Vec<String>,

    /// FEN to analyse
    #[clap(
        long,
        default_value = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
    )]
    fen: String,

    /// Search limit, in nodes (or milliseconds with --movetime)
    #[clap(long, default_value = "100000")]
    limit: u64,

    /// Interpret the limit as milliseconds rather than nodes
    #[clap(long)]
    movetime: bool,

    /// Print surviving info lines as they arrive
    #[clap(long)]
    show_info: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%dT%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(if args.show_info {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .chain(std::io::stderr())
        .apply()?;

    let progress = Rc::new(RefCell::new(Progress::default()));
    let variant = VariantFlag::new();
    let config = config::shared(Config {
        log_positions: true,
        log_info_lines: false,
        use_movetime: args.movetime,
        searchmoves_buttons: false,
    });

    let mut driver = Driver::new(
        Box::new(ProbeHub {
            progress: progress.clone(),
        }),
        Box::new(ProbeInfo {
            variant: variant.clone(),
            show: args.show_info,
        }),
        Box::new(ProbeHost),
        variant,
        config,
    );

    driver
        .setup(&args.engine, &args.engine_arg)
        .with_context(|| format!("could not launch {:?}", args.engine))?;
    let events = driver
        .events()
        .context("engine transport has no event channel")?
        .clone();

    driver.send("uci");

    let node: NodeRef = Rc::new(ProbeNode {
        fen: args.fen.clone(),
    });
    let mut sent_isready = false;
    let mut started = false;

    loop {
        let event = match events.recv_timeout(Duration::from_secs(60)) {
            Ok(event) => event,
            Err(_) => bail!("engine went silent without reporting a bestmove"),
        };
        let closed = event == LineEvent::Closed;
        driver.handle_event(event);

        if progress.borrow().bestmove.is_some() {
            break;
        }
        if closed {
            bail!("engine exited before reporting a bestmove");
        }

        if progress.borrow().uciok && !sent_isready {
            driver.send("isready");
            sent_isready = true;
        }
        if progress.borrow().readyok && !started {
            driver.set_search_desired(Some(node.clone()), Some(args.limit), &[]);
            started = true;
        }
    }

    driver.shutdown();
    Ok(())
}
