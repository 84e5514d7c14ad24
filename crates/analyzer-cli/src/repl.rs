use std::io::{BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};

use analyzer_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use analyzer_contracts::conversation::Conversation;
use analyzer_contracts::prompts::quick_actions;
use analyzer_engine::codec;
use analyzer_engine::{AnalyzerEngine, Phase, Rejection, SubmitUpdate, VisionModel};
use anyhow::Result;
use image::DynamicImage;
use serde_json::Value;
use tracing::warn;

const BUSY_NOTICE: &str = "An analysis is already running. Wait for it to finish.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct ChatSession<'a, M: VisionModel> {
    engine: &'a AnalyzerEngine<M>,
    conversation: Conversation,
    session_path: Option<PathBuf>,
    image: Option<DynamicImage>,
}

impl<'a, M: VisionModel> ChatSession<'a, M> {
    pub fn new(
        engine: &'a AnalyzerEngine<M>,
        conversation: Conversation,
        session_path: Option<PathBuf>,
    ) -> Self {
        Self {
            engine,
            conversation,
            session_path,
            image: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> Result<()> {
        let mut line = String::new();
        loop {
            write!(out, "> ")?;
            out.flush()?;

            line.clear();
            let read = match input.read_line(&mut line) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if read == 0 {
                break;
            }
            let text = line.trim_end_matches(['\n', '\r']).to_string();
            if self.handle_line(&text, &mut out)? == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    pub fn handle_line<W: Write>(&mut self, text: &str, out: &mut W) -> Result<Flow> {
        let intent = parse_intent(text);
        match intent.action.as_str() {
            "noop" => {}
            "help" => {
                writeln!(out, "Commands: {}", CHAT_HELP_COMMANDS.join(" "))?;
                for action in quick_actions().values() {
                    writeln!(out, "  /{:<8} {}", action.command, action.label)?;
                }
            }
            "quit" => return Ok(Flow::Quit),
            "set_image" => match value_as_non_empty_string(intent.command_args.get("path")) {
                Some(path) => self.set_image(Path::new(&path), out)?,
                None => writeln!(out, "/image requires a path")?,
            },
            "clear_image" => {
                self.image = None;
                writeln!(out, "Image cleared.")?;
            }
            "ask" => {
                let prompt = intent.prompt.unwrap_or_default();
                self.submit(&prompt, out)?;
            }
            "compose" => {
                let prompt = intent.prompt.unwrap_or_default();
                if prompt.is_empty() {
                    writeln!(out, "Usage: /compose <text|table|list|json> <task>")?;
                } else {
                    writeln!(out, "Prompt: {prompt}")?;
                    self.submit(&prompt, out)?;
                }
            }
            "history" => {
                if self.conversation.is_empty() {
                    writeln!(out, "No turns yet.")?;
                }
                for turn in self.conversation.turns() {
                    match turn.prompt() {
                        Some(prompt) => writeln!(out, "You: {prompt}\nModel: {}", turn.response)?,
                        None => writeln!(out, "System: {}", turn.response)?,
                    }
                }
            }
            "export" => {
                let out_path = value_as_non_empty_string(intent.command_args.get("path"))
                    .map(PathBuf::from);
                match self
                    .engine
                    .export_report(&self.conversation, out_path.as_deref())
                {
                    Ok(path) => writeln!(out, "Report written to {}", path.display())?,
                    Err(err) => writeln!(out, "Export failed: {err:#}")?,
                }
            }
            "unknown" => {
                let command = value_as_non_empty_string(intent.command_args.get("command"))
                    .unwrap_or_else(|| "unknown".to_string());
                writeln!(out, "Unknown command: /{command}")?;
            }
            other => writeln!(out, "Unknown command: {other}")?,
        }
        Ok(Flow::Continue)
    }

    pub fn set_image<W: Write>(&mut self, path: &Path, out: &mut W) -> Result<()> {
        match codec::load(path) {
            Ok(image) => {
                writeln!(
                    out,
                    "Image loaded: {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                )?;
                self.image = Some(image);
            }
            Err(err) => writeln!(out, "Could not open image: {err:#}")?,
        }
        Ok(())
    }

    fn submit<W: Write>(&mut self, question: &str, out: &mut W) -> Result<()> {
        let updates = self
            .engine
            .submit(self.image.as_ref(), question, &mut self.conversation);
        write_submission(out, updates)?;
        if let Some(path) = self.session_path.as_deref() {
            if let Err(err) = self.conversation.save(path) {
                warn!(path = %path.display(), error = %format!("{err:#}"), "failed to save session");
            }
        }
        Ok(())
    }
}

/// Prints each snapshot of a submission as it arrives.
pub fn write_submission<W: Write>(
    out: &mut W,
    updates: impl Iterator<Item = SubmitUpdate>,
) -> Result<()> {
    for update in updates {
        let latest = update
            .conversation
            .last()
            .map(|turn| turn.response.as_str())
            .unwrap_or_default();
        match update.phase {
            Phase::Working => writeln!(out, "{latest}")?,
            Phase::Answered { duration_s, .. } => {
                writeln!(out, "{latest}")?;
                writeln!(out, "({duration_s:.2} s)")?;
            }
            Phase::Rejected(Rejection::Busy) => writeln!(out, "{BUSY_NOTICE}")?,
            Phase::Rejected(_) => writeln!(out, "{latest}")?,
        }
        out.flush()?;
    }
    Ok(())
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use analyzer_contracts::conversation::{Conversation, Turn};
    use analyzer_contracts::store::InteractionStore;
    use analyzer_engine::{AnalyzerEngine, HealthStatus, VisionModel};
    use image::{Rgb, RgbImage};

    use super::{ChatSession, Flow};

    #[derive(Default)]
    struct EchoModel {
        questions: Mutex<Vec<String>>,
    }

    impl VisionModel for EchoModel {
        fn model(&self) -> &str {
            "echo-vl"
        }

        fn infer(&self, _encoded_image: &str, question: &str) -> String {
            self.questions.lock().unwrap().push(question.to_string());
            format!("answer to: {question}")
        }

        fn health_check(&self) -> HealthStatus {
            HealthStatus::healthy()
        }
    }

    fn engine() -> anyhow::Result<AnalyzerEngine<EchoModel>> {
        Ok(AnalyzerEngine::with_model(
            EchoModel::default(),
            Arc::new(InteractionStore::open_in_memory()?),
            "PRO ANALYZER Report",
        ))
    }

    fn write_png(dir: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
        let path = dir.join("photo.png");
        RgbImage::from_pixel(8, 8, Rgb([10, 200, 30])).save(&path)?;
        Ok(path)
    }

    fn drive(session: &mut ChatSession<'_, EchoModel>, lines: &str) -> anyhow::Result<String> {
        let mut out = Vec::new();
        session.run(lines.as_bytes(), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn question_without_image_gets_advisory() -> anyhow::Result<()> {
        let engine = engine()?;
        let mut session = ChatSession::new(&engine, Conversation::new(), None);
        let output = drive(&mut session, "What is this?\n")?;
        assert!(output.contains("Please upload an image first."));
        assert_eq!(
            session.conversation().turns(),
            &[Turn::system("Please upload an image first.")]
        );
        Ok(())
    }

    #[test]
    fn image_then_question_prints_placeholder_then_answer() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let image = write_png(temp.path())?;
        let session_file = temp.path().join("session.json");
        let engine = engine()?;
        let mut session = ChatSession::new(&engine, Conversation::new(), Some(session_file.clone()));

        let script = format!("/image {}\nWhat is this?\n/quit\nignored\n", image.display());
        let output = drive(&mut session, &script)?;

        let working = output.find("Analyzing... please wait.").unwrap();
        let answer = output.find("answer to: What is this?").unwrap();
        assert!(working < answer);
        assert!(output.contains("Image loaded:"));
        assert_eq!(engine.store().count()?, 1);
        assert_eq!(Conversation::load(&session_file)?.len(), 1);
        Ok(())
    }

    #[test]
    fn quick_action_and_compose_submit_built_prompts() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let image = write_png(temp.path())?;
        let engine = engine()?;
        let mut session = ChatSession::new(&engine, Conversation::new(), None);
        let mut out = Vec::new();
        session.set_image(&image, &mut out)?;

        session.handle_line("/ocr", &mut out)?;
        session.handle_line("/compose list name the colours", &mut out)?;
        session.handle_line("/compose json", &mut out)?;

        let turns = session.conversation().turns();
        assert_eq!(turns.len(), 2);
        assert!(turns[0].prompt.starts_with("Extract all visible text"));
        assert_eq!(
            turns[1].prompt,
            "name the colours Return the result in the format: List."
        );
        assert!(String::from_utf8(out)?.contains("Usage: /compose"));
        Ok(())
    }

    #[test]
    fn export_writes_report_to_requested_path() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = engine()?;
        let mut session = ChatSession::new(
            &engine,
            Conversation::from_turns(vec![Turn::exchange("q", "a")]),
            None,
        );
        let target = temp.path().join("report.pdf");
        let mut out = Vec::new();
        session.handle_line(&format!("/export {}", target.display()), &mut out)?;
        assert!(String::from_utf8(out)?.starts_with("Report written to"));
        assert!(std::fs::read(&target)?.starts_with(b"%PDF"));
        Ok(())
    }

    #[test]
    fn commands_do_not_touch_the_conversation() -> anyhow::Result<()> {
        let engine = engine()?;
        let mut session = ChatSession::new(&engine, Conversation::new(), None);
        let mut out = Vec::new();
        assert_eq!(session.handle_line("/help", &mut out)?, Flow::Continue);
        assert_eq!(session.handle_line("/bogus", &mut out)?, Flow::Continue);
        assert_eq!(session.handle_line("/clear_image", &mut out)?, Flow::Continue);
        assert_eq!(session.handle_line("/exit", &mut out)?, Flow::Quit);
        let output = String::from_utf8(out)?;
        assert!(output.contains("/detail"));
        assert!(output.contains("Unknown command: /bogus"));
        assert!(session.conversation().is_empty());
        Ok(())
    }
}
