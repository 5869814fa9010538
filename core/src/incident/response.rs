use super::model::{IncidentReport, NormalizedEntry, Priority, TimelineItem};
use super::transcript::{infer_priority, participants};
use crate::error::{CoreError, CoreResult};
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use time::macros::format_description;
use time::Date;

pub const FALLBACK_TITLE: &str = "Incident Report — Slack Thread Incident";
const TITLE_PREFIX: &str = "Incident Report — ";
const TITLE_SUMMARY_CHARS: usize = 80;
/// Shortest text considered when matching a timeline line to a transcript line.
const MIN_MATCH_CHARS: usize = 8;

/// Parser state: which report section the current line belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Section {
    #[default]
    Preamble,
    Title,
    Date,
    Author,
    Priority,
    Status,
    Category,
    Environment,
    AffectedResources,
    Description,
    Summary,
    Timeline,
    Impact,
    RootCause,
    Remediation,
    WentWell,
    WentWrong,
    Tags,
}

fn section_for(name: &str) -> Option<Section> {
    let section = match name {
        "title" | "incident title" => Section::Title,
        "date" | "incident date" => Section::Date,
        "author" | "resolved by" | "owner" => Section::Author,
        "priority" | "severity" => Section::Priority,
        "status" | "incident status" => Section::Status,
        "category" => Section::Category,
        "environment" => Section::Environment,
        "affected resources" | "affected resource(s)" | "affected resource" | "affected systems" => {
            Section::AffectedResources
        }
        "description" | "incident description" => Section::Description,
        "summary" | "executive summary" | "incident summary" => Section::Summary,
        "timeline" | "timeline of events" => Section::Timeline,
        "impact" | "business impact" => Section::Impact,
        "root cause" | "root cause analysis" => Section::RootCause,
        "remediation" | "remediation steps" | "action items" => Section::Remediation,
        "what went well" => Section::WentWell,
        "what went wrong" | "what could be improved" => Section::WentWrong,
        "tags" | "keywords" => Section::Tags,
        _ => return None,
    };
    Some(section)
}

/// Parse the model's loosely structured answer into a complete report.
/// Anything the model omitted is filled from the transcript or a default.
pub fn parse_incident_response(
    raw: &str,
    transcript: &[NormalizedEntry],
    generated_at: &str,
) -> CoreResult<IncidentReport> {
    if raw.lines().next().is_none() {
        return Err(CoreError::Parse(
            "model response contains no lines".to_string(),
        ));
    }

    let patterns = ResponsePatterns::new()?;
    let mut scanner = ResponseScanner::default();
    for line in raw.lines() {
        scanner.feed(line);
    }
    Ok(scanner.finish(&patterns, transcript, generated_at))
}

struct ResponsePatterns {
    full_stamp: Regex,
    clock_stamp: Regex,
    date: Regex,
    emphasis: Regex,
}

fn compile(pattern: &str) -> CoreResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| CoreError::Parse(format!("response pattern failed to compile: {}", e)))
}

impl ResponsePatterns {
    fn new() -> CoreResult<Self> {
        Ok(Self {
            full_stamp: compile(
                r"^\[?\s*(\d{4}-\d{2}-\d{2})[ T](\d{1,2}):(\d{2})(?::(\d{2}))?(?:\.\d+)?\s*(?:(?:Z|UTC)\b)?\s*\]?",
            )?,
            clock_stamp: compile(
                r"^\[?\s*(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\s*([AaPp][Mm])\b)?\s*\]?",
            )?,
            date: compile(r"\b(\d{4}-\d{2}-\d{2})\b")?,
            emphasis: compile(r"\*\*(\S(?:.*?\S)?)\*\*|__(\S(?:.*?\S)?)__")?,
        })
    }

    /// Drop paired `**bold**` and `__bold__` markers, keeping the text.
    fn plain(&self, text: &str) -> String {
        self.emphasis
            .replace_all(text, |caps: &Captures| {
                caps.get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

#[derive(Default)]
struct ResponseScanner {
    section: Section,
    title: Vec<String>,
    date: Vec<String>,
    author: Vec<String>,
    priority: Vec<String>,
    status: Vec<String>,
    category: Vec<String>,
    environment: Vec<String>,
    affected_resources: Vec<String>,
    description: Vec<String>,
    summary: Vec<String>,
    timeline: Vec<String>,
    impact: Vec<String>,
    root_cause: Vec<String>,
    remediation: Vec<String>,
    went_well: Vec<String>,
    went_wrong: Vec<String>,
    tags: Vec<String>,
}

impl ResponseScanner {
    fn buffer(&mut self) -> Option<&mut Vec<String>> {
        let buffer = match self.section {
            Section::Preamble => return None,
            Section::Title => &mut self.title,
            Section::Date => &mut self.date,
            Section::Author => &mut self.author,
            Section::Priority => &mut self.priority,
            Section::Status => &mut self.status,
            Section::Category => &mut self.category,
            Section::Environment => &mut self.environment,
            Section::AffectedResources => &mut self.affected_resources,
            Section::Description => &mut self.description,
            Section::Summary => &mut self.summary,
            Section::Timeline => &mut self.timeline,
            Section::Impact => &mut self.impact,
            Section::RootCause => &mut self.root_cause,
            Section::Remediation => &mut self.remediation,
            Section::WentWell => &mut self.went_well,
            Section::WentWrong => &mut self.went_wrong,
            Section::Tags => &mut self.tags,
        };
        Some(buffer)
    }

    fn feed(&mut self, line: &str) {
        let line = line.trim();
        if is_decoration(line) {
            return;
        }
        if let Some((section, rest)) = match_header(line) {
            self.section = section;
            if rest.is_empty() {
                return;
            }
            if let Some(buffer) = self.buffer() {
                buffer.push(rest);
            }
            return;
        }
        if let Some(buffer) = self.buffer() {
            buffer.push(line.to_string());
        }
    }

    fn finish(
        self,
        patterns: &ResponsePatterns,
        transcript: &[NormalizedEntry],
        generated_at: &str,
    ) -> IncidentReport {
        let summary = paragraph_text(patterns, &self.summary);
        let title = first_line(&self.title)
            .map(|line| clean_inline(&patterns.plain(line)))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fallback_title(&summary));
        let single = |lines: &[String]| {
            first_line(lines)
                .map(|line| clean_inline(&patterns.plain(line)))
                .unwrap_or_default()
        };

        let incident_date = self
            .date
            .iter()
            .flat_map(|line| patterns.date.captures_iter(line))
            .map(|c| c[1].to_string())
            .find(|d| is_calendar_date(d))
            .or_else(|| transcript.first().map(|e| e.date().to_string()))
            .unwrap_or_else(|| generated_at.get(..10).unwrap_or(generated_at).to_string());

        let priority =
            priority_from_text(&self.priority.join(" ")).unwrap_or_else(|| infer_priority(transcript));

        let timeline = self
            .timeline
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| parse_timeline_line(patterns, line, transcript))
            .collect();

        IncidentReport {
            title,
            incident_date,
            generated_at: generated_at.to_string(),
            author: single(&self.author),
            priority,
            status: normalize_status(&patterns.plain(&self.status.join(" "))),
            category: single(&self.category),
            environment: single(&self.environment),
            affected_resources: bullet_items(patterns, &self.affected_resources).join(", "),
            description: paragraph_text(patterns, &self.description),
            summary,
            timeline,
            impact: bullet_items(patterns, &self.impact),
            root_cause: paragraph_text(patterns, &self.root_cause),
            remediation: bullet_items(patterns, &self.remediation),
            went_well: bullet_items(patterns, &self.went_well),
            went_wrong: bullet_items(patterns, &self.went_wrong),
            tags: parse_tags(&self.tags),
            participants: participants(transcript),
        }
    }
}

/// Code fences and horizontal rules carry no content.
fn is_decoration(line: &str) -> bool {
    if line.starts_with("```") {
        return true;
    }
    let mut chars = line.chars();
    match chars.next() {
        Some(first @ ('-' | '*' | '_' | '=')) => line.len() >= 3 && chars.all(|c| c == first),
        _ => false,
    }
}

/// Recognise a section header, returning the section and any inline text
/// that followed the colon.
fn match_header(line: &str) -> Option<(Section, String)> {
    let (list_marked, body) = match strip_list_marker(line) {
        Some(rest) => (true, rest),
        None => (false, line.trim()),
    };
    let body = body.trim_start_matches(|c: char| matches!(c, '#' | '>' | '*' | '_') || c.is_whitespace());
    let body = strip_numbering(body);

    let (name, rest) = match body.split_once(':') {
        Some((name, rest)) => (name, rest),
        None => (body, ""),
    };
    let section = section_for(&normalize_header_name(name))?;

    let rest = strip_dangling_emphasis(rest).to_string();
    if list_marked && !rest.is_empty() {
        return None;
    }
    Some((section, rest))
}

fn normalize_header_name(name: &str) -> String {
    name.trim()
        .trim_end_matches(|c: char| matches!(c, '*' | '_' | '#') || c.is_whitespace())
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip a leading bullet (`-`, `*`, `+`, `•`) or list number (`1.`, `2)`).
fn strip_list_marker(line: &str) -> Option<&str> {
    let line = line.trim_start();
    for marker in ["- ", "* ", "+ ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim_start());
        }
    }
    let rest = strip_numbering(line);
    if rest.len() < line.len() {
        return Some(rest);
    }
    None
}

fn strip_numbering(text: &str) -> &str {
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return text;
    }
    let rest = &text[digits..];
    match rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
        Some(after) => after.trim_start(),
        None => text,
    }
}

fn first_line(lines: &[String]) -> Option<&str> {
    lines.iter().map(|l| l.trim()).find(|l| !l.is_empty())
}

/// Remove an emphasis marker left unpaired at either end, as happens when a
/// bold header or timestamp is split from its text.
fn strip_dangling_emphasis(text: &str) -> &str {
    let text = text.trim();
    for marker in ["**", "__", "*", "_"] {
        if text.matches(marker).count() % 2 == 0 {
            continue;
        }
        if let Some(after) = text.strip_prefix(marker) {
            return after.trim();
        }
        if let Some(before) = text.strip_suffix(marker) {
            return before.trim();
        }
    }
    text
}

fn clean_inline(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '"' | '`'))
        .trim()
        .to_string()
}

fn fallback_title(summary: &str) -> String {
    match summary.lines().map(str::trim).find(|l| !l.is_empty()) {
        Some(line) => {
            let head: String = line.chars().take(TITLE_SUMMARY_CHARS).collect();
            format!("{}{}", TITLE_PREFIX, head.trim_end())
        }
        None => FALLBACK_TITLE.to_string(),
    }
}

/// Non-empty lines grouped into paragraphs; blank lines separate them.
fn paragraph_text(patterns: &ResponsePatterns, lines: &[String]) -> String {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    patterns.plain(&paragraphs.join("\n\n"))
}

fn bullet_items(patterns: &ResponsePatterns, lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            let item = strip_list_marker(line).unwrap_or(line.trim());
            let item = ["[ ]", "[x]", "[X]"]
                .iter()
                .find_map(|checkbox| item.strip_prefix(*checkbox))
                .unwrap_or(item);
            patterns.plain(item.trim())
        })
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_tags(lines: &[String]) -> BTreeSet<String> {
    lines
        .iter()
        .flat_map(|line| line.split(|c: char| c == ',' || c == ';' || c.is_whitespace()))
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn is_calendar_date(text: &str) -> bool {
    Date::parse(text, format_description!("[year]-[month]-[day]")).is_ok()
}

fn priority_from_text(text: &str) -> Option<Priority> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .map(|word| word.to_ascii_lowercase())
        .find_map(|word| match word.as_str() {
            "high" | "critical" | "urgent" | "p1" | "sev1" => Some(Priority::High),
            "medium" | "moderate" | "p2" | "sev2" => Some(Priority::Medium),
            "low" | "minor" | "p3" | "sev3" => Some(Priority::Low),
            _ => None,
        })
}

/// Canonical status when the text opens with one; anything else is kept as
/// the model wrote it.
fn normalize_status(text: &str) -> String {
    let status = clean_inline(text);
    let first_word = status
        .split(|c: char| !c.is_alphanumeric())
        .find(|word| !word.is_empty())
        .unwrap_or_default()
        .to_lowercase();
    let canonical = match first_word.as_str() {
        "resolved" | "fixed" | "closed" => "Resolved",
        "monitoring" | "monitored" => "Monitoring",
        "investigating" | "ongoing" | "open" => "Investigating",
        _ => return status,
    };
    canonical.to_string()
}

/// Timestamp token found at the start of a timeline line.
enum Stamp {
    /// Calendar date plus clock time; `precise` when seconds were given.
    Full { display: String, precise: bool },
    /// Clock time only, normalised to 24h `HH:MM[:SS]`.
    Clock { key: String, written: String },
}

impl Stamp {
    fn as_written(&self) -> String {
        match self {
            Stamp::Full { display, .. } => display.clone(),
            Stamp::Clock { written, .. } => written.clone(),
        }
    }
}

fn read_stamp<'a>(patterns: &ResponsePatterns, body: &'a str) -> (Option<Stamp>, &'a str) {
    if let Some(caps) = patterns.full_stamp.captures(body) {
        let mut display = format!("{} {:0>2}:{}", &caps[1], &caps[2], &caps[3]);
        let precise = caps.get(4).is_some();
        if let Some(seconds) = caps.get(4) {
            display.push(':');
            display.push_str(seconds.as_str());
        }
        return (Some(Stamp::Full { display, precise }), &body[match_end(&caps)..]);
    }
    if let Some(caps) = patterns.clock_stamp.captures(body) {
        let hour: u32 = caps[1].parse().unwrap_or(0);
        let meridiem = caps.get(4).map(|m| m.as_str().to_ascii_lowercase());
        let hour = match meridiem.as_deref() {
            Some("pm") => hour % 12 + 12,
            Some(_) => hour % 12,
            None => hour,
        };
        let mut key = format!("{:02}:{}", hour, &caps[2]);
        if let Some(seconds) = caps.get(3) {
            key.push(':');
            key.push_str(seconds.as_str());
        }
        let written = caps[0]
            .trim_matches(|c: char| matches!(c, '[' | ']') || c.is_whitespace())
            .to_string();
        return (Some(Stamp::Clock { key, written }), &body[match_end(&caps)..]);
    }
    (None, body)
}

fn match_end(caps: &Captures) -> usize {
    caps.get(0).map(|m| m.end()).unwrap_or(0)
}

fn parse_timeline_line(
    patterns: &ResponsePatterns,
    line: &str,
    transcript: &[NormalizedEntry],
) -> TimelineItem {
    let body = strip_list_marker(line).unwrap_or(line.trim());
    // Bold timestamps: `**15:32** - ...`
    let unbolded = body.trim_start_matches(|c: char| matches!(c, '*' | '_'));
    let body = if unbolded.starts_with(|c: char| c.is_ascii_digit() || c == '[') {
        unbolded
    } else {
        body
    };
    let (stamp, rest) = read_stamp(patterns, body);

    let is_separator =
        |c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | ':' | '|' | ')');
    let description = strip_dangling_emphasis(rest.trim_start_matches(is_separator))
        .trim_start_matches(is_separator);
    let description = if description.is_empty() && stamp.is_none() {
        patterns.plain(body.trim())
    } else {
        patterns.plain(description)
    };

    TimelineItem {
        timestamp_display: anchor_timestamp(stamp.as_ref(), &description, transcript),
        description,
    }
}

/// Transcript timestamps win over whatever the model wrote. A timestamp
/// token that singles out one entry outranks any text overlap.
fn anchor_timestamp(
    stamp: Option<&Stamp>,
    description: &str,
    transcript: &[NormalizedEntry],
) -> Option<String> {
    if let Some(Stamp::Full {
        display,
        precise: true,
    }) = stamp
    {
        if transcript.iter().any(|e| e.timestamp_display == *display) {
            return Some(display.clone());
        }
    }

    let by_token = match stamp {
        Some(Stamp::Full {
            display,
            precise: false,
        }) => unique_entry(transcript, |e| e.timestamp_display.starts_with(display.as_str())),
        Some(Stamp::Clock { key, .. }) => unique_entry(transcript, |e| {
            e.timestamp_display
                .get(11..)
                .is_some_and(|clock| clock.starts_with(key.as_str()))
        }),
        _ => None,
    };

    by_token
        .or_else(|| best_text_match(transcript, description))
        .map(|entry| entry.timestamp_display.clone())
        .or_else(|| stamp.map(Stamp::as_written))
}

fn unique_entry<F>(transcript: &[NormalizedEntry], matches: F) -> Option<&NormalizedEntry>
where
    F: Fn(&NormalizedEntry) -> bool,
{
    let mut hits = transcript.iter().filter(|e| matches(*e));
    match (hits.next(), hits.next()) {
        (Some(entry), None) => Some(entry),
        _ => None,
    }
}

/// Entry whose text best matches the description: an exact match first,
/// then the longest overlap. Ties go to the earlier entry.
fn best_text_match<'a>(
    transcript: &'a [NormalizedEntry],
    description: &str,
) -> Option<&'a NormalizedEntry> {
    let description = description.trim().to_lowercase();
    if description.is_empty() {
        return None;
    }
    let mut best: Option<(usize, &NormalizedEntry)> = None;
    for entry in transcript {
        let Some(score) = overlap_score(&entry.text.trim().to_lowercase(), &description) else {
            continue;
        };
        if best.map_or(true, |(top, _)| score > top) {
            best = Some((score, entry));
        }
    }
    best.map(|(_, entry)| entry)
}

/// Characters shared when one text contains the other; exact equality scores
/// above any partial overlap.
fn overlap_score(entry_text: &str, description: &str) -> Option<usize> {
    if entry_text == description {
        return Some(usize::MAX);
    }
    let contained = if entry_text.contains(description) {
        description
    } else if description.contains(entry_text) {
        entry_text
    } else {
        return None;
    };
    let chars = contained.chars().count();
    (chars >= MIN_MATCH_CHARS).then_some(chars)
}
