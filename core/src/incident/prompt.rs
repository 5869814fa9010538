use super::model::NormalizedEntry;

/// Section headers the model is asked to emit, in report order.
pub const SECTION_HEADERS: [&str; 17] = [
    "TITLE:",
    "DATE:",
    "AUTHOR:",
    "PRIORITY:",
    "STATUS:",
    "CATEGORY:",
    "ENVIRONMENT:",
    "AFFECTED RESOURCES:",
    "DESCRIPTION:",
    "SUMMARY:",
    "TIMELINE:",
    "IMPACT:",
    "ROOT CAUSE:",
    "REMEDIATION:",
    "WHAT WENT WELL:",
    "WHAT WENT WRONG:",
    "TAGS:",
];

pub const EXTRACTION_INSTRUCTIONS: &str = r#"You are an expert incident response analyst. Write a structured incident report from the Slack conversation transcript below.

Answer in plain text using exactly these section headers, each on its own line, in this order:

TITLE: one short line naming the incident
DATE: the date the incident started, as YYYY-MM-DD
AUTHOR: the name of the primary person who resolved the issue
PRIORITY: one of High, Medium, Low
STATUS: one of Resolved, Investigating, Monitoring
CATEGORY: the kind of incident, e.g. Infrastructure, Application, Database
ENVIRONMENT: where it happened, e.g. Production, Staging
AFFECTED RESOURCES: comma-separated systems or services, e.g. Jenkins, API Server
DESCRIPTION: one sentence describing the incident
SUMMARY: two to four sentences describing what happened
TIMELINE: one event per line, formatted as "- [YYYY-MM-DD HH:MM:SS] - description"
IMPACT: one bullet per affected system, user group or consequence
ROOT CAUSE: a short paragraph
REMEDIATION: one bullet per step taken or still required
WHAT WENT WELL: one bullet per point
WHAT WENT WRONG: one bullet per point that could be improved
TAGS: comma-separated lowercase keywords

IMPORTANT: every timeline event must use the EXACT timestamp of the transcript line it describes, copied verbatim in [YYYY-MM-DD HH:MM:SS] form. Do not invent times, do not shorten them, and do not write "Unknown Time".
If a section has nothing to report, keep its header and leave it empty. Do not add any other sections, commentary or code fences."#;

/// `[timestamp] author: text`, one line per entry.
pub fn render_transcript(entries: &[NormalizedEntry]) -> String {
    entries
        .iter()
        .map(NormalizedEntry::transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full extraction prompt: fixed instructions followed by the transcript.
/// Pure function of its input.
pub fn build_extraction_prompt(entries: &[NormalizedEntry]) -> String {
    format!(
        "{}\n\nSlack thread transcript:\n\n{}\n",
        EXTRACTION_INSTRUCTIONS,
        render_transcript(entries)
    )
}
