mod document;
mod pdf;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use analyzer_contracts::conversation::Conversation;
use analyzer_contracts::store::InteractionStore;
use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};

use crate::host::HostIdentity;

pub use document::{segment_response, Block, ReportDocument};

const REPORT_PREFIX: &str = "pro-analyzer-report-";

/// Turns a conversation plus what the store remembers about each prompt
/// into an A4 PDF.
pub struct ReportGenerator {
    store: Arc<InteractionStore>,
    model: String,
    title: String,
}

impl ReportGenerator {
    pub fn new(store: Arc<InteractionStore>, model: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            store,
            model: model.into(),
            title: title.into(),
        }
    }

    pub fn build_document(&self, conversation: &Conversation) -> ReportDocument {
        self.build_document_for_host(conversation, &HostIdentity::detect())
    }

    pub fn build_document_for_host(
        &self,
        conversation: &Conversation,
        host: &HostIdentity,
    ) -> ReportDocument {
        let mut document = ReportDocument::new(self.title.clone());
        document.push(Block::Title(self.title.clone()));
        document.push(Block::Line(format!(
            "Created: {}",
            Local::now().format("%d.%m.%Y %H:%M:%S")
        )));
        document.push(Block::Line(format!("Model: {}", self.model)));
        document.push(Block::Line(format!("Host: {}", host.hostname)));
        document.push(Block::Line(format!("IP address: {}", host.address)));
        document.push(Block::Spacer);

        for (idx, turn) in conversation.turns().iter().enumerate() {
            if turn.pending {
                continue;
            }
            match turn.prompt() {
                Some(prompt) => {
                    document.push(Block::Heading(format!("Prompt {}: {prompt}", idx + 1)));
                    let record = match self.store.find_latest_by_prompt(prompt) {
                        Ok(record) => record,
                        Err(err) => {
                            warn!(error = %format!("{err:#}"), "report lookup failed; rendering the turn without stored details");
                            None
                        }
                    };
                    if let Some(record) = record {
                        if let Some(duration) = record.duration() {
                            document.push(Block::Label(format!("Response time: {duration:.2} s")));
                        }
                        if let Some(image) = record.image {
                            document.push(Block::Image(image));
                        }
                    }
                }
                None => document.push(Block::Heading("System:".to_string())),
            }
            document.extend(segment_response(&turn.response));
            document.push(Block::Spacer);
        }
        document
    }

    /// Writes the report to a fresh temp file that outlives this call and
    /// returns its path.
    pub fn render(&self, conversation: &Conversation) -> Result<PathBuf> {
        let bytes = pdf::render_pdf(&self.build_document(conversation))?;
        let mut file = tempfile::Builder::new()
            .prefix(REPORT_PREFIX)
            .suffix(".pdf")
            .tempfile()
            .context("failed to create report file")?;
        file.write_all(&bytes).context("failed to write report")?;
        let (_, path) = file.keep().context("failed to keep report file")?;
        info!(path = %path.display(), turns = conversation.len(), "report exported");
        Ok(path)
    }

    pub fn render_to(&self, conversation: &Conversation, path: &Path) -> Result<PathBuf> {
        let bytes = pdf::render_pdf(&self.build_document(conversation))?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        std::fs::write(path, bytes)
            .with_context(|| format!("failed writing report {}", path.display()))?;
        info!(path = %path.display(), turns = conversation.len(), "report exported");
        Ok(path.to_path_buf())
    }
}
