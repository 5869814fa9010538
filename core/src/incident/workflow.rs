use super::model::{IncidentReport, NormalizedEntry};
use super::prompt::build_extraction_prompt;
use super::render::render_report;
use super::response::parse_incident_response;
use super::transcript::{format_display, normalize_transcript};
use super::writer::{report_file_stem, write_report, WrittenReport};
use crate::config::ReporterConfig;
use crate::determinism::run_id::{run_id_ulid, transcript_fingerprint};
use crate::error::{CoreError, CoreResult};
use crate::llm::interface::{CompletionClient, SamplingConfig};
use crate::slack::client::ConversationApi;
use crate::slack::identity::IdentityResolver;
use crate::slack::model::ThreadMetadata;
use crate::slack::thread_ref::{ts_to_epoch, ThreadRef};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, info_span};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportWorkflowStage {
    Configured,
    Fetched,
    Normalized,
    Prompted,
    Extracted,
    Parsed,
    Rendered,
    Written,
}

/// Everything one report run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub channel_id: String,
    pub thread_ts: String,
    pub output_dir: PathBuf,
    pub utc_offset: UtcOffset,
    pub sampling: SamplingConfig,
    /// Creation time stamped on the report, `YYYY-MM-DD HH:MM:SS`.
    pub generated_at: String,
}

impl ReportJob {
    /// A permalink's own channel takes precedence over the configured one.
    pub fn from_config(config: &ReporterConfig, thread: ThreadRef) -> CoreResult<Self> {
        let now = OffsetDateTime::now_utc().to_offset(config.utc_offset);
        Ok(Self {
            channel_id: thread
                .channel_id
                .unwrap_or_else(|| config.slack.channel_id.clone()),
            thread_ts: thread.thread_ts,
            output_dir: config.reports_dir.clone(),
            utc_offset: config.utc_offset,
            sampling: config.inference.sampling.clone(),
            generated_at: format_display(now)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReportWorkflowState {
    pub stage: ReportWorkflowStage,
    pub job: ReportJob,
}

impl ReportWorkflowState {
    pub fn ingest(job: ReportJob) -> CoreResult<Self> {
        if job.channel_id.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "a channel id is required".to_string(),
            ));
        }
        if ts_to_epoch(&job.thread_ts).is_none() {
            return Err(CoreError::InvalidInput(format!(
                "thread ts {:?} is not a Slack timestamp",
                job.thread_ts
            )));
        }
        Ok(Self {
            stage: ReportWorkflowStage::Configured,
            job,
        })
    }

    pub fn transition(self, next: ReportWorkflowStage) -> CoreResult<Self> {
        let allowed = matches!(
            (self.stage, next),
            (ReportWorkflowStage::Configured, ReportWorkflowStage::Fetched)
                | (ReportWorkflowStage::Fetched, ReportWorkflowStage::Normalized)
                | (ReportWorkflowStage::Normalized, ReportWorkflowStage::Prompted)
                | (ReportWorkflowStage::Prompted, ReportWorkflowStage::Extracted)
                | (ReportWorkflowStage::Extracted, ReportWorkflowStage::Parsed)
                | (ReportWorkflowStage::Parsed, ReportWorkflowStage::Rendered)
                | (ReportWorkflowStage::Rendered, ReportWorkflowStage::Written)
        );
        if !allowed {
            return Err(CoreError::WorkflowTransition(format!(
                "invalid transition {:?} -> {:?}",
                self.stage, next
            )));
        }
        Ok(Self {
            stage: next,
            job: self.job,
        })
    }
}

/// Transcript and prompt for a thread, before any inference call.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub metadata: ThreadMetadata,
    pub entries: Vec<NormalizedEntry>,
    pub prompt: String,
    pub identity_lookups: usize,
}

#[derive(Debug, Clone)]
pub struct ReportWorkflowOutput {
    pub stage: ReportWorkflowStage,
    pub run_id: String,
    pub report: IncidentReport,
    pub written: WrittenReport,
    pub message_count: usize,
    pub entry_count: usize,
    pub identity_lookups: usize,
}

/// Fetch and normalize a thread and build its prompt without calling the model.
pub fn prepare_prompt<S>(job: ReportJob, slack: &S) -> CoreResult<PreparedPrompt>
where
    S: ConversationApi + ?Sized,
{
    let run_id = run_id_ulid();
    let span = info_span!("report_run", run_id = %run_id);
    let _entered = span.enter();

    let state = ReportWorkflowState::ingest(job)?;
    let (_, prepared) = gather_transcript(state, slack)?;
    Ok(prepared)
}

/// Run the whole pipeline: fetch → normalize → prompt → extract → parse →
/// render → write.
pub fn execute_report_workflow<S, L>(
    job: ReportJob,
    slack: &S,
    llm: &L,
) -> CoreResult<ReportWorkflowOutput>
where
    S: ConversationApi + ?Sized,
    L: CompletionClient + ?Sized,
{
    let run_id = run_id_ulid();
    let span = info_span!("report_run", run_id = %run_id);
    let _entered = span.enter();

    let state = ReportWorkflowState::ingest(job)?;
    info!(
        channel = %state.job.channel_id,
        thread_ts = %state.job.thread_ts,
        "starting incident report run"
    );
    let (state, prepared) = gather_transcript(state, slack)?;

    info!(model = %state.job.sampling.model, "requesting extraction");
    let raw = llm.complete(&prepared.prompt, &state.job.sampling)?;
    debug!(chars = raw.len(), "model response received");
    let state = state.transition(ReportWorkflowStage::Extracted)?;

    let report = parse_incident_response(&raw, &prepared.entries, &state.job.generated_at)?;
    info!(
        title = %report.title,
        timeline_items = report.timeline.len(),
        tags = report.tags.len(),
        "model response parsed"
    );
    let state = state.transition(ReportWorkflowStage::Parsed)?;

    let rendered = render_report(&report);
    let state = state.transition(ReportWorkflowStage::Rendered)?;

    let stem = report_file_stem(&report.incident_date, &report.title);
    let written = write_report(&state.job.output_dir, &stem, &rendered)?;
    info!(
        html = %written.html_path.display(),
        html_sha256 = %written.html_sha256,
        markdown = %written.markdown_path.display(),
        markdown_sha256 = %written.markdown_sha256,
        "report written"
    );
    let state = state.transition(ReportWorkflowStage::Written)?;

    Ok(ReportWorkflowOutput {
        stage: state.stage,
        run_id,
        report,
        written,
        message_count: prepared.metadata.message_count,
        entry_count: prepared.entries.len(),
        identity_lookups: prepared.identity_lookups,
    })
}

fn gather_transcript<S>(
    state: ReportWorkflowState,
    slack: &S,
) -> CoreResult<(ReportWorkflowState, PreparedPrompt)>
where
    S: ConversationApi + ?Sized,
{
    let thread = slack.fetch_thread(&state.job.channel_id, &state.job.thread_ts)?;
    info!(
        messages = thread.metadata.message_count,
        replies = thread.metadata.reply_count,
        "thread fetched"
    );
    let state = state.transition(ReportWorkflowStage::Fetched)?;

    let mut resolver = IdentityResolver::new(slack);
    let entries = normalize_transcript(&thread.messages, &mut resolver, state.job.utc_offset)?;
    if entries.is_empty() {
        return Err(CoreError::InvalidInput(format!(
            "thread {} has no readable messages",
            state.job.thread_ts
        )));
    }
    info!(
        entries = entries.len(),
        identity_lookups = resolver.lookups(),
        fingerprint = %transcript_fingerprint(&entries),
        "transcript normalized"
    );
    let state = state.transition(ReportWorkflowStage::Normalized)?;

    let prompt = build_extraction_prompt(&entries);
    debug!(chars = prompt.len(), "extraction prompt built");
    let state = state.transition(ReportWorkflowStage::Prompted)?;

    let prepared = PreparedPrompt {
        metadata: thread.metadata,
        entries,
        prompt,
        identity_lookups: resolver.lookups(),
    };
    Ok((state, prepared))
}
