//! Book-keeping for engine options.

use std::collections::HashMap;

/// Tracks what the engine has been told, and holds back what it cannot be
/// told yet.
///
/// UCI engines reject (or worse, misapply) `setoption` while searching, so
/// option writes that arrive mid-search are queued here and flushed by the
/// driver at the next search boundary. The `sent` map remembers the last
/// value written for each option, keyed by lowercased name; it also stands in
/// for engine state when no process is loaded, so the host's menus keep
/// tracking the user's intent.
#[derive(Debug, Default)]
pub struct OptionRegistry {
    sent: HashMap<String, String>,
    pending: Vec<String>,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `key → value`. `key` must already be lowercase.
    pub fn record(&mut self, key: &str, value: &str) {
        self.sent.insert(key.to_string(), value.to_string());
    }

    /// Last value sent for `key` (lowercase), if any.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.sent.get(key).map(String::as_str)
    }

    /// Defer a raw `setoption` line until the current search ends.
    pub fn queue(&mut self, raw_line: String) {
        log::debug!("(queued until search boundary) {}", raw_line);
        self.pending.push(raw_line);
    }

    /// Hand back the deferred lines in arrival order, leaving the queue
    /// empty. The driver sends each with the force flag set, at the moment
    /// the running search has just been cleared.
    pub fn take_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// True iff the engine has been told `UCI_Chess960` is `true`.
    pub fn in_960_mode(&self) -> bool {
        self.value("uci_chess960") == Some("true")
    }

    /// Drop everything we believe the engine knows. Used when a fresh
    /// process is launched: it has been told nothing.
    pub fn forget_all(&mut self) {
        self.sent.clear();
        self.pending.clear();
    }
}

/// Extract the `name <N> value <V>` fragment from a `setoption` line.
///
/// The `name` and `value` keywords are matched case-insensitively and must
/// appear in that order; the option name may span several tokens. Returns the
/// lowercased name and the value with its original casing, or `None` for
/// lines that don't carry both markers (button presses have no `value` and
/// are deliberately not recorded).
pub fn parse_setoption(line: &str) -> Option<(String, String)> {
    let mut tokens = line.split_ascii_whitespace();
    if !tokens.next()?.eq_ignore_ascii_case("setoption") {
        return None;
    }

    let mut name_parts: Vec<&str> = Vec::new();
    let mut value_parts: Vec<&str> = Vec::new();
    let mut seen_name = false;
    let mut seen_value = false;
    for tok in tokens {
        if !seen_name {
            if !tok.eq_ignore_ascii_case("name") {
                return None;
            }
            seen_name = true;
        } else if !seen_value && tok.eq_ignore_ascii_case("value") {
            seen_value = true;
        } else if !seen_value {
            name_parts.push(tok);
        } else {
            value_parts.push(tok);
        }
    }

    if !seen_name || !seen_value || name_parts.is_empty() {
        return None;
    }
    Some((
        name_parts.join(" ").to_ascii_lowercase(),
        value_parts.join(" "),
    ))
}

/// Well-known option names re-acked with empty values whenever a fresh
/// engine is launched, so the host's menu check-marks reset.
pub const RESET_ACK_OPTIONS: &[&str] = &[
    "multipv",
    "threads",
    "hash",
    "weightsfile",
    "backend",
    "syzygypath",
    "contempt",
    "uci_chess960",
    "temperature",
    "tempdecaymoves",
];

const LEELAISH_ONLY: &[&str] = &[
    "weightsfile",
    "backend",
    "backendoptions",
    "cpuct",
    "temperature",
    "tempdecaymoves",
];

const CLASSICAL_ONLY: &[&str] = &["hash", "clear hash", "syzygypath", "contempt"];

/// Whether `key` (lowercase) should be withheld from the current engine
/// variant, and why.
pub fn suppressed_for_variant(key: &str, leelaish: bool) -> Option<&'static str> {
    if leelaish {
        if CLASSICAL_ONLY.contains(&key) {
            return Some("this option is only sent to alpha-beta engines");
        }
    } else if LEELAISH_ONLY.contains(&key) {
        return Some("this option is only sent to Leela-like engines");
    }
    None
}
