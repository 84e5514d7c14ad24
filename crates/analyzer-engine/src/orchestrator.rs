use std::sync::Arc;
use std::time::Instant;

use analyzer_contracts::conversation::{Conversation, Turn};
use analyzer_contracts::store::{InteractionMeta, InteractionStore, NewInteraction};
use image::DynamicImage;
use tracing::{debug, error, info, warn};

use crate::client::{HealthStatus, VisionModel};
use crate::codec;

pub const WORKING_TEXT: &str = "Analyzing... please wait.";
pub const NO_IMAGE_ADVISORY: &str = "Please upload an image first.";
pub const NO_QUESTION_ADVISORY: &str = "Please ask a question or use a quick action.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingImage,
    EmptyQuestion,
    /// Another interaction on this conversation is still waiting for the model.
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Rejected(Rejection),
    Working,
    Answered {
        record_id: Option<i64>,
        duration_s: f64,
    },
}

/// One snapshot for the caller to render.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitUpdate {
    pub conversation: Conversation,
    pub input_cleared: bool,
    /// `false` while the model call is in flight; the caller must not start
    /// another submission on this conversation until it flips back.
    pub controls_enabled: bool,
    pub phase: Phase,
}

pub struct Orchestrator<M: VisionModel> {
    model: M,
    store: Arc<InteractionStore>,
}

impl<M: VisionModel> Orchestrator<M> {
    pub fn new(model: M, store: Arc<InteractionStore>) -> Self {
        Self { model, store }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn store(&self) -> &Arc<InteractionStore> {
        &self.store
    }

    pub fn health_check(&self) -> HealthStatus {
        self.model.health_check()
    }

    /// Starts one interaction. Nothing happens until the returned iterator is
    /// driven: the first `next()` validates and shows the placeholder, the
    /// second calls the model and persists the result.
    pub fn submit<'a>(
        &'a self,
        image: Option<&'a DynamicImage>,
        question: &str,
        conversation: &'a mut Conversation,
    ) -> Submission<'a, M> {
        Submission {
            orchestrator: self,
            conversation,
            question: question.to_string(),
            stage: Stage::Validating(image),
        }
    }
}

enum Stage<'a> {
    Validating(Option<&'a DynamicImage>),
    Calling(&'a DynamicImage),
    Done,
}

/// A single submission, yielding its snapshots in order.
///
/// Rejections yield once. Accepted questions yield the placeholder and then
/// the final answer.
pub struct Submission<'a, M: VisionModel> {
    orchestrator: &'a Orchestrator<M>,
    conversation: &'a mut Conversation,
    question: String,
    stage: Stage<'a>,
}

impl<'a, M: VisionModel> Submission<'a, M> {
    /// Drives the submission to completion and returns the last snapshot.
    pub fn finish(self) -> Option<SubmitUpdate> {
        self.last()
    }

    fn validate(&mut self, image: Option<&'a DynamicImage>) -> SubmitUpdate {
        if self.conversation.has_pending() {
            warn!(session = %self.conversation.session_id, "submission rejected: interaction in flight");
            return self.snapshot(Phase::Rejected(Rejection::Busy), false, false);
        }
        let Some(image) = image else {
            self.conversation.push(Turn::system(NO_IMAGE_ADVISORY));
            return self.snapshot(Phase::Rejected(Rejection::MissingImage), false, true);
        };
        if self.question.trim().is_empty() {
            self.conversation.push(Turn::system(NO_QUESTION_ADVISORY));
            return self.snapshot(Phase::Rejected(Rejection::EmptyQuestion), false, true);
        }
        if self
            .conversation
            .begin_pending(self.question.clone(), WORKING_TEXT)
            .is_err()
        {
            return self.snapshot(Phase::Rejected(Rejection::Busy), false, false);
        }
        self.stage = Stage::Calling(image);
        self.snapshot(Phase::Working, true, false)
    }

    fn call(&mut self, image: &DynamicImage) -> SubmitUpdate {
        let model = &self.orchestrator.model;
        let started = Instant::now();
        let (response, image_bytes) = match codec::encode(image) {
            Ok(encoded) => {
                debug!(question = %self.question, "calling vision model");
                let response = model.infer(&encoded, &self.question);
                (response, codec::decode(&encoded).ok())
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "image encoding failed");
                (format!("Error: the image could not be encoded: {err:#}"), None)
            }
        };
        let duration_s = started.elapsed().as_secs_f64();

        self.conversation.take_pending();
        let prefix = self.conversation.history_pairs();
        self.conversation
            .push(Turn::exchange(self.question.clone(), response.clone()));

        let entry = NewInteraction {
            prompt: self.question.clone(),
            response,
            image: image_bytes,
            model: model.model().to_string(),
            meta: Some(InteractionMeta {
                chat_history: prefix,
                duration: Some(duration_s),
                session_id: Some(self.conversation.session_id.to_string()),
            }),
        };
        let record_id = match self.orchestrator.store.append(&entry) {
            Ok(id) => {
                info!(id, duration_s, "interaction persisted");
                Some(id)
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to persist interaction; keeping it in the session only");
                None
            }
        };
        self.snapshot(
            Phase::Answered {
                record_id,
                duration_s,
            },
            true,
            true,
        )
    }

    fn snapshot(&self, phase: Phase, input_cleared: bool, controls_enabled: bool) -> SubmitUpdate {
        SubmitUpdate {
            conversation: self.conversation.clone(),
            input_cleared,
            controls_enabled,
            phase,
        }
    }
}

impl<'a, M: VisionModel> Iterator for Submission<'a, M> {
    type Item = SubmitUpdate;

    fn next(&mut self) -> Option<SubmitUpdate> {
        match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Validating(image) => Some(self.validate(image)),
            Stage::Calling(image) => Some(self.call(image)),
            Stage::Done => None,
        }
    }
}

impl<'a, M: VisionModel> Drop for Submission<'a, M> {
    /// Removes the placeholder of a submission abandoned after its first yield.
    fn drop(&mut self) {
        if matches!(self.stage, Stage::Calling(_)) && self.conversation.take_pending().is_some() {
            debug!(session = %self.conversation.session_id, "submission dropped before the model call; placeholder removed");
        }
    }
}
