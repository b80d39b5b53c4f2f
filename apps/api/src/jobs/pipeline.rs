//! Pipeline Driver — runs one job from `processing` to a terminal state.
//!
//! Flow: fan out metadata / CV / cover letter / message generation →
//!       await metadata → name artifacts → await CV → write + compile →
//!       await cover letter → write + compile → await message → write →
//!       optional email → completed.
//!
//! The four model calls run concurrently, bounded by a semaphore shared by
//! every job, so one job's calls can queue behind another job's. Results are
//! consumed in that fixed order so file writes
//! and compiler runs happen in the same sequence for every job. Any error
//! fails the job, aborts the generation tasks still in flight and leaves
//! already-written files in place.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::generation::generator::{GenerationRequest, GenerationTask, TextGenerator};
use crate::generation::metadata::{parse_metadata, ArtifactNames};
use crate::jobs::manager::{JobError, JobManager};
use crate::jobs::models::{JobArtifacts, JobInputs};
use crate::llm_client::LlmError;
use crate::notify::{Notifier, NotifyOutcome};
use crate::render::{CompileError, DocumentCompiler};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{task} generation failed: {source}")]
    Generation {
        task: &'static str,
        source: LlmError,
    },

    #[error("Could not read job metadata: {0}")]
    Metadata(LlmError),

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{task} generation task stopped unexpectedly: {source}")]
    Join {
        task: &'static str,
        source: JoinError,
    },

    #[error(transparent)]
    Job(#[from] JobError),
}

/// Aborts the wrapped task when dropped, so an early return cancels
/// generation calls whose results will never be read.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The four in-flight generation tasks of one job.
struct FanOut {
    metadata: AbortOnDrop<Result<String, LlmError>>,
    cv: AbortOnDrop<Result<String, LlmError>>,
    cover_letter: AbortOnDrop<Result<String, LlmError>>,
    message: AbortOnDrop<Result<String, LlmError>>,
}

pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    compiler: Arc<dyn DocumentCompiler>,
    notifier: Arc<dyn Notifier>,
    output_dir: PathBuf,
    generation_slots: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        compiler: Arc<dyn DocumentCompiler>,
        notifier: Arc<dyn Notifier>,
        output_dir: PathBuf,
        generation_concurrency: usize,
    ) -> Self {
        Self {
            generator,
            compiler,
            notifier,
            output_dir,
            generation_slots: Arc::new(Semaphore::new(generation_concurrency.max(1))),
        }
    }

    /// Drives a queued job to `completed` or `failed`.
    pub async fn execute(&self, jobs: &JobManager, id: Uuid, inputs: JobInputs) {
        if let Err(e) = jobs.start(id).await {
            error!("Job {id} could not start: {e}");
            return;
        }
        info!("Job {id} processing");

        match self.run(jobs, id, &inputs).await {
            Ok(artifacts) => {
                if let Err(e) = jobs.complete(id, artifacts).await {
                    error!("Job {id} could not be marked completed: {e}");
                } else {
                    info!("Job {id} completed");
                }
            }
            Err(e) => {
                warn!("Job {id} failed: {e}");
                if let Err(e) = jobs.fail(id, e.to_string()).await {
                    error!("Job {id} could not be marked failed: {e}");
                }
            }
        }
    }

    async fn run(
        &self,
        jobs: &JobManager,
        id: Uuid,
        inputs: &JobInputs,
    ) -> Result<JobArtifacts, PipelineError> {
        let fan_out = self.fan_out(inputs);
        jobs.append_log(id, "Submitted metadata, CV, cover letter and message generation")
            .await?;

        // Step 1: metadata decides every file name
        let raw = join(GenerationTask::Metadata, fan_out.metadata).await?;
        let metadata = parse_metadata(&raw).map_err(PipelineError::Metadata)?;
        let names = ArtifactNames::new(&metadata, id);
        jobs.append_log(
            id,
            format!(
                "Metadata extracted: company '{}', title '{}'",
                metadata.company, metadata.title
            ),
        )
        .await?;

        // Step 2: CV
        let cv_text = join(GenerationTask::Cv, fan_out.cv).await?;
        let cv_pdf = self
            .write_and_compile(jobs, id, GenerationTask::Cv, &cv_text, &names.cv_source())
            .await?;

        // Step 3: cover letter
        let letter_text = join(GenerationTask::CoverLetter, fan_out.cover_letter).await?;
        let letter_pdf = self
            .write_and_compile(
                jobs,
                id,
                GenerationTask::CoverLetter,
                &letter_text,
                &names.cover_letter_source(),
            )
            .await?;

        // Step 4: message
        let message_text = join(GenerationTask::Message, fan_out.message).await?;
        let message = GenerationTask::Message.clean_output(&message_text);
        self.write_artifact(&names.message(), &message).await?;
        jobs.append_log(id, format!("Message saved as {}", names.message()))
            .await?;

        // Step 5: optional email, never fatal
        if let Some(recipient) = inputs.recipient_email.as_deref() {
            self.notify(jobs, id, recipient, &[cv_pdf, letter_pdf]).await?;
        }

        Ok(JobArtifacts {
            cv: names.cv_document(),
            cover_letter: names.cover_letter_document(),
            cv_source: names.cv_source(),
            cover_letter_source: names.cover_letter_source(),
            message: names.message(),
        })
    }

    fn fan_out(&self, inputs: &JobInputs) -> FanOut {
        FanOut {
            metadata: self.spawn_generation(GenerationTask::Metadata, inputs),
            cv: self.spawn_generation(GenerationTask::Cv, inputs),
            cover_letter: self.spawn_generation(GenerationTask::CoverLetter, inputs),
            message: self.spawn_generation(GenerationTask::Message, inputs),
        }
    }

    fn spawn_generation(
        &self,
        task: GenerationTask,
        inputs: &JobInputs,
    ) -> AbortOnDrop<Result<String, LlmError>> {
        let request = GenerationRequest::for_task(task, inputs);
        let generator = Arc::clone(&self.generator);
        let slots = Arc::clone(&self.generation_slots);

        AbortOnDrop(tokio::spawn(async move {
            // Never closed, so acquire cannot fail.
            let _permit = slots.acquire_owned().await.ok();
            generator.generate(&request).await
        }))
    }

    async fn write_and_compile(
        &self,
        jobs: &JobManager,
        id: Uuid,
        task: GenerationTask,
        raw: &str,
        source_name: &str,
    ) -> Result<PathBuf, PipelineError> {
        let source = self
            .write_artifact(source_name, &task.clean_output(raw))
            .await?;
        jobs.append_log(id, format!("{} source saved as {source_name}", capitalize(task.label())))
            .await?;

        let pdf = self.compiler.compile(&source, &self.output_dir).await?;
        let pdf_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        jobs.append_log(id, format!("{} compiled to {pdf_name}", capitalize(task.label())))
            .await?;
        Ok(pdf)
    }

    async fn write_artifact(&self, name: &str, contents: &str) -> Result<PathBuf, PipelineError> {
        let path = self.output_dir.join(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| PipelineError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    async fn notify(
        &self,
        jobs: &JobManager,
        id: Uuid,
        recipient: &str,
        attachments: &[PathBuf],
    ) -> Result<(), JobError> {
        let line = match self.notifier.send(recipient, attachments).await {
            Ok(NotifyOutcome::Sent) => format!("Email sent to {recipient}"),
            Ok(NotifyOutcome::Skipped) => {
                "Email credentials not configured, skipping email".to_string()
            }
            Err(e) => {
                warn!("Job {id}: email to {recipient} failed: {e}");
                format!("Failed to send email: {e}")
            }
        };
        jobs.append_log(id, line).await
    }
}

async fn join(
    task: GenerationTask,
    mut handle: AbortOnDrop<Result<String, LlmError>>,
) -> Result<String, PipelineError> {
    match (&mut handle.0).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(source)) => Err(PipelineError::Generation {
            task: task.label(),
            source,
        }),
        Err(source) => Err(PipelineError::Join {
            task: task.label(),
            source,
        }),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{oneshot, Notify};

    use super::*;
    use crate::jobs::models::JobStatus;
    use crate::notify::NotifyError;

    /// Canned answers per task. Metadata answers slowest to prove ordering
    /// does not depend on completion order.
    pub(crate) struct FakeGenerator {
        pub metadata: String,
        pub fail_on: Option<GenerationTask>,
    }

    impl FakeGenerator {
        pub(crate) fn acme() -> Self {
            Self {
                metadata: r#"```json
{"company":"Acme","title":"Backend_Engineer"}
```"#
                    .to_string(),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
            if self.fail_on == Some(request.task) {
                return Err(LlmError::Api {
                    status: 503,
                    message: "model overloaded".to_string(),
                });
            }
            match request.task {
                GenerationTask::Metadata => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(self.metadata.clone())
                }
                GenerationTask::Cv => Ok("```latex\n\\documentclass{article} CV\n```".to_string()),
                GenerationTask::CoverLetter => Ok("\\documentclass{letter} LETTER".to_string()),
                GenerationTask::Message => Ok("# Note\nHi **Acme**, keen to talk.".to_string()),
            }
        }
    }

    /// Writes `<stem>.pdf` next to the source unless told to fail, and
    /// records the order of compiled sources.
    #[derive(Default)]
    pub(crate) struct FakeCompiler {
        pub compiled: Mutex<Vec<String>>,
        pub produce_output: bool,
    }

    impl FakeCompiler {
        pub(crate) fn working() -> Self {
            Self {
                compiled: Mutex::new(Vec::new()),
                produce_output: true,
            }
        }
    }

    #[async_trait]
    impl DocumentCompiler for FakeCompiler {
        async fn compile(&self, source: &Path, output_dir: &Path) -> Result<PathBuf, CompileError> {
            let stem = source.file_stem().unwrap().to_string_lossy().into_owned();
            self.compiled.lock().unwrap().push(stem.clone());
            if !self.produce_output {
                return Err(CompileError::NoOutput {
                    exit_code: Some(1),
                    diagnostics: "! LaTeX Error: File `moderncv.cls' not found.".to_string(),
                });
            }
            let pdf = output_dir.join(format!("{stem}.pdf"));
            tokio::fs::write(&pdf, b"%PDF-1.4").await?;
            Ok(pdf)
        }
    }

    /// Records sends; optionally behaves like missing credentials or a broken server.
    pub(crate) struct FakeNotifier {
        pub outcome: Result<NotifyOutcome, ()>,
        pub sent: Mutex<Vec<(String, usize)>>,
    }

    impl FakeNotifier {
        pub(crate) fn with(outcome: Result<NotifyOutcome, ()>) -> Self {
            Self {
                outcome,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send(
            &self,
            recipient: &str,
            attachments: &[PathBuf],
        ) -> Result<NotifyOutcome, NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), attachments.len()));
            match self.outcome {
                Ok(outcome) => Ok(outcome),
                Err(()) => Err(NotifyError::Attachment {
                    path: PathBuf::from("CV.pdf"),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "connection reset"),
                }),
            }
        }
    }

    pub(crate) fn inputs(email: Option<&str>) -> JobInputs {
        JobInputs {
            job_description: "Backend Engineer at Acme".to_string(),
            master_profile: "Jane Doe, Rust".to_string(),
            cv_template: "\\documentclass{article}".to_string(),
            cover_letter_template: "\\documentclass{letter}".to_string(),
            recipient_email: email.map(String::from),
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        output_dir: PathBuf,
        compiler: Arc<FakeCompiler>,
        notifier: Arc<FakeNotifier>,
        pipeline: Pipeline,
        jobs: JobManager,
    }

    fn harness(
        generator: FakeGenerator,
        compiler: FakeCompiler,
        notifier: FakeNotifier,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().to_path_buf();
        let compiler = Arc::new(compiler);
        let notifier = Arc::new(notifier);
        let pipeline = Pipeline::new(
            Arc::new(generator),
            compiler.clone(),
            notifier.clone(),
            output_dir.clone(),
            2,
        );
        Harness {
            _dir: dir,
            output_dir,
            compiler,
            notifier,
            pipeline,
            jobs: JobManager::new(),
        }
    }

    fn position(logs: &[String], needle: &str) -> usize {
        logs.iter()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("no log line containing {needle:?} in {logs:?}"))
    }

    #[tokio::test]
    async fn test_completed_job_embeds_metadata_in_file_names() {
        let h = harness(
            FakeGenerator::acme(),
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;

        h.pipeline.execute(&h.jobs, id, inputs(None)).await;

        let record = h.jobs.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed, "logs: {:?}", record.logs);
        let result = record.result.unwrap();
        assert!(result.cv.starts_with("CV_Backend_Engineer_Acme_"));
        assert!(result.cv.ends_with(".pdf"));
        assert!(result.cover_letter.starts_with("CoverLetter_Backend_Engineer_Acme_"));
        assert!(result.message.starts_with("Message_Backend_Engineer_Acme_"));

        for name in [
            &result.cv,
            &result.cover_letter,
            &result.cv_source,
            &result.cover_letter_source,
            &result.message,
        ] {
            assert!(h.output_dir.join(name).exists(), "{name} missing");
        }
    }

    #[tokio::test]
    async fn test_artifacts_are_cleaned_before_writing() {
        let h = harness(
            FakeGenerator::acme(),
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(None)).await;
        let result = h.jobs.get(id).await.unwrap().result.unwrap();

        let cv = std::fs::read_to_string(h.output_dir.join(&result.cv_source)).unwrap();
        assert_eq!(cv, "\\documentclass{article} CV");
        let message = std::fs::read_to_string(h.output_dir.join(&result.message)).unwrap();
        assert_eq!(message, "Hi Acme, keen to talk.");
    }

    #[tokio::test]
    async fn test_side_effects_follow_fixed_order() {
        let h = harness(
            FakeGenerator::acme(),
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(Some("jane@example.com"))).await;

        let logs = h.jobs.get(id).await.unwrap().logs;
        let metadata = position(&logs, "Metadata extracted");
        let cv = position(&logs, "CV compiled");
        let letter = position(&logs, "Cover letter compiled");
        let message = position(&logs, "Message saved");
        let email = position(&logs, "Email sent");
        assert!(metadata < cv && cv < letter && letter < message && message < email);

        let compiled = h.compiler.compiled.lock().unwrap().clone();
        assert_eq!(compiled.len(), 2);
        assert!(compiled[0].starts_with("CV_"));
        assert!(compiled[1].starts_with("CoverLetter_"));
    }

    #[tokio::test]
    async fn test_compiler_without_output_fails_job_with_diagnostics() {
        let compiler = FakeCompiler {
            compiled: Mutex::new(Vec::new()),
            produce_output: false,
        };
        let h = harness(
            FakeGenerator::acme(),
            compiler,
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(Some("jane@example.com"))).await;

        let record = h.jobs.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.result.is_none());
        let last = record.logs.last().unwrap();
        assert!(last.contains("no PDF produced"), "{last}");
        assert!(last.contains("moderncv.cls"), "{last}");

        // Fails at the CV: the cover letter is never compiled, nobody is emailed.
        assert_eq!(h.compiler.compiled.lock().unwrap().len(), 1);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_still_complete() {
        let h = harness(
            FakeGenerator::acme(),
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Skipped)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(Some("jane@example.com"))).await;

        let record = h.jobs.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert!(record.logs.iter().any(|l| l.contains("skipping email")));
        let result = record.result.unwrap();
        assert!(h.output_dir.join(result.cv).exists());
        assert!(h.output_dir.join(result.cover_letter).exists());
    }

    #[tokio::test]
    async fn test_email_failure_is_not_fatal() {
        let h = harness(
            FakeGenerator::acme(),
            FakeCompiler::working(),
            FakeNotifier::with(Err(())),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(Some("jane@example.com"))).await;

        let record = h.jobs.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert!(record.logs.iter().any(|l| l.contains("Failed to send email")));
        assert_eq!(
            *h.notifier.sent.lock().unwrap(),
            vec![("jane@example.com".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_no_recipient_means_no_email() {
        let h = harness(
            FakeGenerator::acme(),
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(None)).await;

        assert_eq!(h.jobs.get(id).await.unwrap().status, JobStatus::Completed);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_error_fails_job() {
        let generator = FakeGenerator {
            fail_on: Some(GenerationTask::CoverLetter),
            ..FakeGenerator::acme()
        };
        let h = harness(
            generator,
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(None)).await;

        let record = h.jobs.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        let last = record.logs.last().unwrap();
        assert!(last.contains("cover letter generation failed"), "{last}");
        assert!(last.contains("model overloaded"), "{last}");
        // CV artifacts written before the failure stay in place.
        assert_eq!(h.compiler.compiled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_metadata_fails_before_any_write() {
        let generator = FakeGenerator {
            metadata: "Acme is hiring a backend engineer".to_string(),
            fail_on: None,
        };
        let h = harness(
            generator,
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(None)).await;

        let record = h.jobs.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.logs.last().unwrap().contains("Could not read job metadata"));
        assert!(h.compiler.compiled.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(&h.output_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_terminal_job_is_not_reprocessed() {
        let h = harness(
            FakeGenerator::acme(),
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(None)).await;
        let first = h.jobs.get(id).await.unwrap();

        h.pipeline.execute(&h.jobs, id, inputs(None)).await;
        let second = h.jobs.get(id).await.unwrap();
        assert_eq!(second.status, JobStatus::Completed);
        assert_eq!(second.logs, first.logs);
        assert_eq!(h.compiler.compiled.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_null_company_completes_as_unknown() {
        let generator = FakeGenerator {
            metadata: r#"{"company": null, "title": "Backend Engineer"}"#.to_string(),
            fail_on: None,
        };
        let h = harness(
            generator,
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(None)).await;

        let record = h.jobs.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed, "logs: {:?}", record.logs);
        assert!(record
            .result
            .unwrap()
            .cv
            .starts_with("CV_Backend_Engineer_Unknown_"));
    }

    #[tokio::test]
    async fn test_very_long_title_still_writes_artifacts() {
        let title = "Senior Staff Principal Distinguished Platform Engineer ".repeat(4);
        let generator = FakeGenerator {
            metadata: serde_json::json!({"company": "Acme", "title": title}).to_string(),
            fail_on: None,
        };
        let h = harness(
            generator,
            FakeCompiler::working(),
            FakeNotifier::with(Ok(NotifyOutcome::Sent)),
        );
        let id = h.jobs.create().await;
        h.pipeline.execute(&h.jobs, id, inputs(None)).await;

        let record = h.jobs.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed, "logs: {:?}", record.logs);
        let result = record.result.unwrap();
        assert!(result.cover_letter_source.len() < 255);
        assert!(h.output_dir.join(&result.cover_letter_source).exists());
    }

    /// Metadata fails once the CV call is in flight. The CV call never finishes
    /// on its own and holds `cv_alive` until its task is torn down.
    struct FailAfterCvStarts {
        cv_started: Notify,
        cv_alive: Mutex<Option<oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl TextGenerator for FailAfterCvStarts {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
            match request.task {
                GenerationTask::Metadata => {
                    self.cv_started.notified().await;
                    Err(LlmError::EmptyContent)
                }
                GenerationTask::Cv => {
                    let _alive = self.cv_alive.lock().unwrap().take();
                    self.cv_started.notify_one();
                    std::future::pending().await
                }
                _ => std::future::pending().await,
            }
        }
    }

    #[tokio::test]
    async fn test_failure_aborts_generation_still_in_flight() {
        let (alive_tx, alive_rx) = oneshot::channel();
        let generator = FailAfterCvStarts {
            cv_started: Notify::new(),
            cv_alive: Mutex::new(Some(alive_tx)),
        };
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            Arc::new(generator),
            Arc::new(FakeCompiler::working()),
            Arc::new(FakeNotifier::with(Ok(NotifyOutcome::Sent))),
            dir.path().to_path_buf(),
            4,
        );
        let jobs = JobManager::new();
        let id = jobs.create().await;

        pipeline.execute(&jobs, id, inputs(None)).await;

        let record = jobs.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.logs.last().unwrap().contains("metadata generation failed"));

        // The sender is released only when the pending CV call is dropped.
        let released = tokio::time::timeout(Duration::from_secs(1), alive_rx).await;
        assert!(matches!(released, Ok(Err(_))), "CV call still running");
    }

    /// Tracks the highest number of calls in flight at once.
    #[derive(Default)]
    struct CountingGenerator {
        in_flight: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
            use std::sync::atomic::Ordering;

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            FakeGenerator::acme().generate(request).await
        }
    }

    #[tokio::test]
    async fn test_generation_slots_are_shared_across_jobs() {
        let generator = Arc::new(CountingGenerator::default());
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            generator.clone(),
            Arc::new(FakeCompiler::working()),
            Arc::new(FakeNotifier::with(Ok(NotifyOutcome::Sent))),
            dir.path().to_path_buf(),
            1,
        );
        let jobs = JobManager::new();
        let a = jobs.create().await;
        let b = jobs.create().await;

        tokio::join!(
            pipeline.execute(&jobs, a, inputs(None)),
            pipeline.execute(&jobs, b, inputs(None)),
        );

        assert_eq!(jobs.get(a).await.unwrap().status, JobStatus::Completed);
        assert_eq!(jobs.get(b).await.unwrap().status, JobStatus::Completed);
        assert_eq!(generator.peak.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("cover letter"), "Cover letter");
        assert_eq!(capitalize("CV"), "CV");
        assert_eq!(capitalize(""), "");
    }
}
