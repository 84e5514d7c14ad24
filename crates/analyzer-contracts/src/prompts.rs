use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAction {
    pub command: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

const DETAIL_PROMPT: &str = "Create an extremely detailed, tabular description of this image. \
Cover the main objects, background, lighting, colors and composition.";
const OBJECTS_PROMPT: &str =
    "List every recognizable object, person and animal in this image as a numbered list.";
const OCR_PROMPT: &str = "Extract all visible text from this image. Return only the extracted text. \
If there is no text, answer 'No text found'.";
const RATE_PROMPT: &str = "Rate the technical quality of this image on a scale from 1 to 10. \
Justify the rating based on sharpness, exposure, noise and composition.";

/// Predefined analyses, in display order.
pub fn quick_actions() -> IndexMap<&'static str, QuickAction> {
    let mut map = IndexMap::new();
    for action in [
        QuickAction {
            command: "detail",
            label: "Detailed description",
            prompt: DETAIL_PROMPT,
        },
        QuickAction {
            command: "objects",
            label: "List objects",
            prompt: OBJECTS_PROMPT,
        },
        QuickAction {
            command: "ocr",
            label: "Extract text (OCR)",
            prompt: OCR_PROMPT,
        },
        QuickAction {
            command: "rate",
            label: "Rate quality",
            prompt: RATE_PROMPT,
        },
    ] {
        map.insert(action.command, action);
    }
    map
}

pub fn quick_action(command: &str) -> Option<QuickAction> {
    quick_actions().get(command).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    FreeText,
    Table,
    List,
    Json,
}

impl ResponseFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "free" | "freetext" | "free_text" => Some(Self::FreeText),
            "table" => Some(Self::Table),
            "list" => Some(Self::List),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::FreeText => "Free text",
            Self::Table => "Table",
            Self::List => "List",
            Self::Json => "JSON",
        }
    }
}

/// Prompt assistant: appends an explicit output format to a task.
///
/// A blank task yields an empty prompt so the orchestrator's empty-question
/// advisory applies.
pub fn build_prompt(format: ResponseFormat, task: &str) -> String {
    let task = task.trim();
    if task.is_empty() {
        return String::new();
    }
    match format {
        ResponseFormat::FreeText => task.to_string(),
        other => format!("{task} Return the result in the format: {}.", other.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_prompt, quick_action, quick_actions, ResponseFormat};

    #[test]
    fn quick_actions_keep_display_order() {
        let commands: Vec<&str> = quick_actions().keys().copied().collect();
        assert_eq!(commands, vec!["detail", "objects", "ocr", "rate"]);
        assert!(quick_action("ocr").unwrap().prompt.contains("No text found"));
        assert!(quick_action("describe").is_none());
    }

    #[test]
    fn build_prompt_appends_structured_formats_only() {
        assert_eq!(build_prompt(ResponseFormat::FreeText, " Count the cars "), "Count the cars");
        assert_eq!(
            build_prompt(ResponseFormat::Json, "Count the cars"),
            "Count the cars Return the result in the format: JSON."
        );
        assert_eq!(build_prompt(ResponseFormat::Table, "   "), "");
    }

    #[test]
    fn response_format_aliases() {
        assert_eq!(ResponseFormat::parse("TABLE"), Some(ResponseFormat::Table));
        assert_eq!(ResponseFormat::parse("free"), Some(ResponseFormat::FreeText));
        assert_eq!(ResponseFormat::parse("yaml"), None);
    }
}
