//! Classification of inbound engine output.

/// What a stdout line is, judged by its leading token. Everything the driver
/// does not consume itself ends up at the hub as [`LineClass::Misc`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineClass {
    BestMove,
    Info,
    Option,
    UciOk,
    ReadyOk,
    Misc,
}

pub fn classify(line: &str) -> LineClass {
    match line.split_ascii_whitespace().next() {
        Some("bestmove") => LineClass::BestMove,
        Some("info") => LineClass::Info,
        Some("option") => LineClass::Option,
        Some("uciok") => LineClass::UciOk,
        Some("readyok") => LineClass::ReadyOk,
        _ => LineClass::Misc,
    }
}

/// True if an `option` declaration mentions `UCI_Chess960` in any casing.
/// Seeing one is the trigger for auto-enabling 960 move encoding.
pub fn mentions_chess960(line: &str) -> bool {
    line.to_ascii_lowercase().contains("uci_chess960")
}

/// Strip control characters before a line is surfaced to the hub. Engines
/// occasionally emit progress spinners or stray escape sequences on stderr.
pub fn sanitize(line: &str) -> String {
    line.chars().filter(|c| !c.is_control()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_leading_token() {
        assert_eq!(classify("bestmove e2e4 ponder e7e5"), LineClass::BestMove);
        assert_eq!(classify("info depth 10 pv e2e4"), LineClass::Info);
        assert_eq!(classify("option name Threads type spin"), LineClass::Option);
        assert_eq!(classify("uciok"), LineClass::UciOk);
        assert_eq!(classify("readyok"), LineClass::ReadyOk);
        assert_eq!(classify("id name Stockfish 16"), LineClass::Misc);
        assert_eq!(classify(""), LineClass::Misc);
        assert_eq!(classify("   "), LineClass::Misc);
    }

    #[test]
    fn test_leading_whitespace_is_tolerated() {
        assert_eq!(classify("  readyok"), LineClass::ReadyOk);
    }

    #[test]
    fn test_prefix_must_be_a_whole_token() {
        assert_eq!(classify("information overload"), LineClass::Misc);
        assert_eq!(classify("bestmoves"), LineClass::Misc);
    }

    #[test]
    fn test_chess960_mention_ignores_case() {
        assert!(mentions_chess960(
            "option name UCI_Chess960 type check default false"
        ));
        assert!(mentions_chess960("option name uci_CHESS960 type check"));
        assert!(!mentions_chess960("option name Threads type spin"));
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize("loading\rnet\x1b[2J done"), "loadingnet[2J done");
        assert_eq!(sanitize("plain text"), "plain text");
    }
}
