//! Append-only conversation history

use parking_lot::Mutex;
use scribe_ai::Turn;

/// Ordered, append-only log of turns for one conversation.
///
/// Insertion order is chronological order; turns are never reordered,
/// mutated, or removed.
#[derive(Default)]
pub struct History {
    turns: Mutex<Vec<Turn>>,
}

impl History {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history seeded with previously persisted turns
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns),
        }
    }

    /// Append one turn
    pub fn append(&self, turn: Turn) {
        self.turns.lock().push(turn);
    }

    /// Last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> Vec<Turn> {
        let turns = self.turns.lock();
        let start = turns.len().saturating_sub(n);
        turns[start..].to_vec()
    }

    /// All turns, oldest first
    pub fn all(&self) -> Vec<Turn> {
        self.turns.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.turns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let history = History::new();
        history.append(Turn::user("one"));
        history.append(Turn::assistant("two"));
        history.append(Turn::user("three"));

        let all = history.all();
        let contents: Vec<&str> = all.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_recent_takes_tail() {
        let history = History::new();
        for i in 0..5 {
            history.append(Turn::user(format!("msg {}", i)));
        }

        let recent = history.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "msg 3");
        assert_eq!(recent[1].content, "msg 4");
    }

    #[test]
    fn test_recent_more_than_len() {
        let history = History::new();
        history.append(Turn::user("only"));
        assert_eq!(history.recent(10).len(), 1);
    }

    #[test]
    fn test_from_turns_seeds_log() {
        let history = History::from_turns(vec![Turn::user("a"), Turn::assistant("b")]);
        assert_eq!(history.len(), 2);
        assert!(!history.is_empty());
    }
}
