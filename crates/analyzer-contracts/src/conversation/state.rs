use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use super::turn::Turn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("an interaction is already in progress")]
    PendingTurn,
}

/// Ordered turn log for one session.
///
/// At most one pending placeholder exists at a time. Turns are appended and
/// never reordered; only the placeholder is ever removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: Uuid,
    #[serde(default)]
    turns: Vec<Turn>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            turns: Vec::new(),
        }
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        let mut conversation = Self::new();
        for turn in turns {
            conversation.push(turn);
        }
        conversation
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Appends a finished turn. A `pending` flag on the input is cleared.
    pub fn push(&mut self, mut turn: Turn) {
        turn.pending = false;
        self.turns.push(turn);
    }

    pub fn has_pending(&self) -> bool {
        self.turns.iter().any(|turn| turn.pending)
    }

    pub fn begin_pending(
        &mut self,
        prompt: impl Into<String>,
        working_text: impl Into<String>,
    ) -> Result<(), ConversationError> {
        if self.has_pending() {
            return Err(ConversationError::PendingTurn);
        }
        self.turns.push(Turn::placeholder(prompt, working_text));
        Ok(())
    }

    /// Removes the placeholder, looking at the tail and then one before it.
    pub fn take_pending(&mut self) -> Option<Turn> {
        let len = self.turns.len();
        let idx = [len.checked_sub(1), len.checked_sub(2)]
            .into_iter()
            .flatten()
            .find(|idx| self.turns[*idx].pending)?;
        Some(self.turns.remove(idx))
    }

    /// Finished turns as `[prompt|null, response]` pairs, oldest first.
    pub fn history_pairs(&self) -> Vec<Value> {
        self.turns
            .iter()
            .filter(|turn| !turn.pending)
            .map(|turn| json!([turn.prompt(), turn.response]))
            .collect()
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let mut conversation: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid conversation file {}", path.display()))?;
        // A saved placeholder means the process died mid-call.
        conversation.turns.retain(|turn| !turn.pending);
        Ok(conversation)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Conversation, ConversationError};
    use crate::conversation::Turn;

    #[test]
    fn only_one_placeholder_at_a_time() {
        let mut conversation = Conversation::new();
        conversation.begin_pending("q1", "working").unwrap();
        assert_eq!(
            conversation.begin_pending("q2", "working"),
            Err(ConversationError::PendingTurn)
        );
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn take_pending_tolerates_one_trailing_turn() {
        let mut conversation = Conversation::from_turns(vec![Turn::exchange("a", "b")]);
        conversation.begin_pending("q", "working").unwrap();
        conversation.push(Turn::system("late advisory"));

        let removed = conversation.take_pending().unwrap();
        assert_eq!(removed.prompt, "q");
        assert!(!conversation.has_pending());
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.last().unwrap().response, "late advisory");
    }

    #[test]
    fn take_pending_ignores_placeholder_buried_deeper() {
        let mut conversation = Conversation::new();
        conversation.begin_pending("q", "working").unwrap();
        conversation.push(Turn::system("one"));
        conversation.push(Turn::system("two"));
        assert!(conversation.take_pending().is_none());
    }

    #[test]
    fn push_clears_pending_flag() {
        let mut conversation = Conversation::new();
        conversation.push(Turn::placeholder("q", "working"));
        assert!(!conversation.has_pending());
    }

    #[test]
    fn history_pairs_use_null_for_system_turns() {
        let mut conversation = Conversation::from_turns(vec![
            Turn::system("Please upload an image first."),
            Turn::exchange("What is this?", "A cat."),
        ]);
        conversation.begin_pending("next", "working").unwrap();
        assert_eq!(
            conversation.history_pairs(),
            vec![
                json!([null, "Please upload an image first."]),
                json!(["What is this?", "A cat."]),
            ]
        );
    }

    #[test]
    fn save_and_load_drop_stale_placeholders() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("sessions").join("s.json");
        let mut conversation = Conversation::from_turns(vec![Turn::exchange("a", "b")]);
        conversation.begin_pending("q", "working").unwrap();
        conversation.save(&path)?;

        let loaded = Conversation::load(&path)?;
        assert_eq!(loaded.session_id, conversation.session_id);
        assert_eq!(loaded.turns(), &[Turn::exchange("a", "b")]);
        Ok(())
    }
}
