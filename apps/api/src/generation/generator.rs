//! Generation tasks and the `TextGenerator` seam the pipeline fans out over.
//!
//! A job issues exactly four independent requests. Each `GenerationTask`
//! knows its system prompt, how to build its user prompt from the job inputs,
//! and which cleaning steps its answer needs.

use async_trait::async_trait;

use crate::generation::cleaning::{
    clean, CleanStep, JSON_STEPS, LATEX_STEPS, PLAIN_TEXT_STEPS,
};
use crate::generation::prompts::{
    COVER_LETTER_PROMPT_TEMPLATE, COVER_LETTER_SYSTEM, CV_PROMPT_TEMPLATE, CV_SYSTEM,
    MESSAGE_PROMPT_TEMPLATE, MESSAGE_SYSTEM, METADATA_PROMPT_TEMPLATE, METADATA_SYSTEM,
};
use crate::jobs::models::JobInputs;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM, LATEX_OUTPUT_INSTRUCTION};
use crate::llm_client::{LlmClient, LlmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationTask {
    Metadata,
    Cv,
    CoverLetter,
    Message,
}

impl GenerationTask {
    pub fn label(self) -> &'static str {
        match self {
            GenerationTask::Metadata => "metadata",
            GenerationTask::Cv => "CV",
            GenerationTask::CoverLetter => "cover letter",
            GenerationTask::Message => "message",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            GenerationTask::Metadata => METADATA_SYSTEM,
            GenerationTask::Cv => CV_SYSTEM,
            GenerationTask::CoverLetter => COVER_LETTER_SYSTEM,
            GenerationTask::Message => MESSAGE_SYSTEM,
        }
    }

    pub fn clean_steps(self) -> &'static [CleanStep] {
        match self {
            GenerationTask::Metadata => JSON_STEPS,
            GenerationTask::Cv | GenerationTask::CoverLetter => LATEX_STEPS,
            GenerationTask::Message => PLAIN_TEXT_STEPS,
        }
    }

    /// Fills this task's prompt template from the job inputs.
    pub fn build_prompt(self, inputs: &JobInputs) -> String {
        match self {
            GenerationTask::Metadata => fill_template(
                METADATA_PROMPT_TEMPLATE,
                &[
                    ("json_only", JSON_ONLY_SYSTEM),
                    ("job_description", inputs.job_description.as_str()),
                ],
            ),
            GenerationTask::Cv => fill_document_prompt(CV_PROMPT_TEMPLATE, inputs, &inputs.cv_template),
            GenerationTask::CoverLetter => fill_document_prompt(
                COVER_LETTER_PROMPT_TEMPLATE,
                inputs,
                &inputs.cover_letter_template,
            ),
            GenerationTask::Message => fill_template(
                MESSAGE_PROMPT_TEMPLATE,
                &[
                    ("grounding_instruction", GROUNDING_INSTRUCTION),
                    ("job_description", inputs.job_description.as_str()),
                    ("master_profile", inputs.master_profile.as_str()),
                ],
            ),
        }
    }

    /// Applies this task's cleaning steps to a raw model answer.
    pub fn clean_output(self, raw: &str) -> String {
        clean(raw, self.clean_steps())
    }
}

fn fill_document_prompt(template: &str, inputs: &JobInputs, document: &str) -> String {
    fill_template(
        template,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("latex_instruction", LATEX_OUTPUT_INSTRUCTION),
            ("template", document),
            ("master_profile", inputs.master_profile.as_str()),
            ("job_description", inputs.job_description.as_str()),
        ],
    )
}

/// Replaces `{key}` placeholders in a single left-to-right pass. Substituted
/// text is never scanned again, and braces that do not name a key are kept.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values.iter().find_map(|(key, value)| {
            let after = tail.strip_prefix(key)?.strip_prefix('}')?;
            Some((*value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// A single prompt ready to send.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task: GenerationTask,
    pub system: &'static str,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn for_task(task: GenerationTask, inputs: &JobInputs) -> Self {
        Self {
            task,
            system: task.system_prompt(),
            prompt: task.build_prompt(inputs),
        }
    }
}

/// Anything that can turn a prompt into text. `LlmClient` in production.
///
/// Carried by the pipeline as `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.call_text(&request.prompt, request.system).await
    }
}
