use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Side-channel payload stored in the `meta` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionMeta {
    /// Conversation prefix before the stored turn, as `[prompt|null, response]` pairs.
    #[serde(default)]
    pub chat_history: Vec<Value>,
    /// Seconds spent waiting on the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl InteractionMeta {
    /// Lenient parse: a malformed payload yields whatever fields still read cleanly.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let obj = value.as_object()?;
        Some(Self {
            chat_history: obj
                .get("chat_history")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            duration: obj.get("duration").and_then(Value::as_f64),
            session_id: obj
                .get("session_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Fields supplied by the caller when appending; id and timestamp are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub prompt: String,
    pub response: String,
    pub image: Option<Vec<u8>>,
    pub model: String,
    pub meta: Option<InteractionMeta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRecord {
    pub id: i64,
    pub timestamp: String,
    pub prompt: String,
    pub response: String,
    pub image: Option<Vec<u8>>,
    pub model: String,
    pub meta: Option<InteractionMeta>,
}

impl InteractionRecord {
    pub fn duration(&self) -> Option<f64> {
        self.meta.as_ref().and_then(|meta| meta.duration)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::InteractionMeta;

    #[test]
    fn parse_keeps_readable_fields_from_odd_payloads() {
        let meta = InteractionMeta::parse(r#"{"duration": "fast", "session_id": "s-1"}"#).unwrap();
        assert_eq!(meta.duration, None);
        assert_eq!(meta.session_id.as_deref(), Some("s-1"));
        assert!(meta.chat_history.is_empty());

        assert!(InteractionMeta::parse("not json").is_none());
        assert!(InteractionMeta::parse("[1, 2]").is_none());
    }

    #[test]
    fn serialized_meta_omits_absent_duration() -> anyhow::Result<()> {
        let meta = InteractionMeta {
            chat_history: vec![json!([null, "hello"])],
            duration: None,
            session_id: None,
        };
        let value = serde_json::to_value(&meta)?;
        assert_eq!(value, json!({"chat_history": [[null, "hello"]]}));
        Ok(())
    }
}
