use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, COMPOSE_COMMAND, NO_ARG_COMMANDS, OPTIONAL_PATH_COMMANDS, SINGLE_PATH_COMMANDS,
};
use crate::prompts::{build_prompt, quick_action, ResponseFormat};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    fn ask(raw: &str, prompt: String) -> Self {
        let mut intent = Self::new("ask", raw);
        intent.prompt = Some(prompt);
        intent
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

fn parse_compose(raw: &str, arg: &str) -> Intent {
    let (head, task) = match arg.split_once(char::is_whitespace) {
        Some((head, task)) => (head, task.trim()),
        None => (arg, ""),
    };
    // Without a recognised format the whole argument is a free-text task.
    let (format, task) = match ResponseFormat::parse(head) {
        Some(format) => (format, task),
        None => (ResponseFormat::FreeText, arg),
    };
    let mut intent = Intent::new(COMPOSE_COMMAND.action, raw);
    intent.prompt = Some(build_prompt(format, task));
    intent.command_args.insert(
        "format".to_string(),
        Value::String(format.label().to_string()),
    );
    intent
}

/// Maps one line of chat input to an action.
///
/// Slash commands drive the session; anything else is a question for the
/// model (`ask`). Blank input is `noop`.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = quick_action(&command) {
                let mut intent = Intent::ask(text, action.prompt.to_string());
                intent.command_args.insert(
                    "quick_action".to_string(),
                    Value::String(action.command.to_string()),
                );
                return intent;
            }

            if command == COMPOSE_COMMAND.command {
                return parse_compose(text, arg);
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, OPTIONAL_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                let path = parse_single_path_arg(arg);
                intent.command_args.insert(
                    "path".to_string(),
                    if path.is_empty() {
                        Value::Null
                    } else {
                        Value::String(path)
                    },
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    Intent::ask(text, raw_trimmed.to_string())
}
