//! Stop-command classification

/// Literal substrings treated as a pure interruption command.
const STOP_PHRASES: &[&str] = &["stop", "cancel", "halt"];

/// Decide whether free-form input is a stop command rather than a new
/// instruction.
///
/// Deliberately a single predicate so the substring heuristic can be swapped
/// for an intent classifier without touching the state machine.
pub fn is_stop_command(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    STOP_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_phrases_match() {
        assert!(is_stop_command("stop"));
        assert!(is_stop_command("STOP"));
        assert!(is_stop_command("  please stop now  "));
        assert!(is_stop_command("cancel that"));
        assert!(is_stop_command("halt!"));
    }

    #[test]
    fn test_instructions_do_not_match() {
        assert!(!is_stop_command("write about owls"));
        assert!(!is_stop_command("actually make it shorter"));
        assert!(!is_stop_command(""));
    }
}
