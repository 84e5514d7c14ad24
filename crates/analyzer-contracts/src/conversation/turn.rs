use serde::{Deserialize, Serialize};

/// One exchange in a conversation.
///
/// `system` turns carry advisory messages and have no prompt; an empty
/// `prompt` on a non-system turn is still a user prompt. `pending` marks the
/// transient placeholder shown while the model is working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default)]
    pub prompt: String,
    pub response: String,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub pending: bool,
}

impl Turn {
    pub fn exchange(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            system: false,
            pending: false,
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self {
            prompt: String::new(),
            response: message.into(),
            system: true,
            pending: false,
        }
    }

    pub fn placeholder(prompt: impl Into<String>, working_text: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: working_text.into(),
            system: false,
            pending: true,
        }
    }

    pub fn is_system_message(&self) -> bool {
        self.system
    }

    pub fn prompt(&self) -> Option<&str> {
        if self.system {
            None
        } else {
            Some(self.prompt.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Turn;

    #[test]
    fn system_turn_has_no_prompt_but_empty_prompt_does() {
        assert_eq!(Turn::system("hint").prompt(), None);
        assert_eq!(Turn::exchange("", "answer").prompt(), Some(""));
    }

    #[test]
    fn deserializes_minimal_rows() -> anyhow::Result<()> {
        let turn: Turn = serde_json::from_value(json!({"response": "Welcome", "system": true}))?;
        assert!(turn.is_system_message());
        assert!(!turn.pending);
        assert_eq!(turn.prompt, "");
        Ok(())
    }
}
