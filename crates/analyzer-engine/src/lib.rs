pub mod client;
pub mod codec;
pub mod host;
pub mod orchestrator;
pub mod report;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use analyzer_contracts::config::AnalyzerConfig;
use analyzer_contracts::conversation::Conversation;
use analyzer_contracts::store::InteractionStore;
use anyhow::Result;
use image::DynamicImage;

pub use client::{HealthStatus, InferenceError, OllamaClient, VisionModel};
pub use orchestrator::{Orchestrator, Phase, Rejection, SubmitUpdate, Submission};
pub use report::ReportGenerator;

/// Everything a front-end needs: submit questions, export reports, and
/// probe the model service before opening the chat.
pub struct AnalyzerEngine<M: VisionModel = OllamaClient> {
    orchestrator: Orchestrator<M>,
    reports: ReportGenerator,
}

impl AnalyzerEngine<OllamaClient> {
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        let store = Arc::new(InteractionStore::open(&config.db_path)?);
        let client = OllamaClient::new(config)?;
        Ok(Self::with_model(client, store, &config.report_title))
    }
}

impl<M: VisionModel> AnalyzerEngine<M> {
    pub fn with_model(model: M, store: Arc<InteractionStore>, report_title: &str) -> Self {
        let reports = ReportGenerator::new(store.clone(), model.model(), report_title);
        Self {
            orchestrator: Orchestrator::new(model, store),
            reports,
        }
    }

    pub fn model_name(&self) -> &str {
        self.orchestrator.model().model()
    }

    pub fn store(&self) -> &Arc<InteractionStore> {
        self.orchestrator.store()
    }

    pub fn health_check(&self) -> HealthStatus {
        self.orchestrator.health_check()
    }

    pub fn submit<'a>(
        &'a self,
        image: Option<&'a DynamicImage>,
        question: &str,
        conversation: &'a mut Conversation,
    ) -> Submission<'a, M> {
        self.orchestrator.submit(image, question, conversation)
    }

    /// Renders to a kept temp file, or to `out` when given.
    pub fn export_report(&self, conversation: &Conversation, out: Option<&Path>) -> Result<PathBuf> {
        match out {
            Some(path) => self.reports.render_to(conversation, path),
            None => self.reports.render(conversation),
        }
    }
}
