use super::model::{IncidentReport, Priority, RenderedReport, TimelineItem};
use std::collections::BTreeSet;

pub const EMPTY_PLACEHOLDER: &str = "None reported.";
const MISSING_TIME: &str = "-";

pub const REPORT_STYLESHEET: &str = r#"body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    line-height: 1.6;
    max-width: 1200px;
    margin: 0 auto;
    padding: 20px;
    background-color: #f5f5f5;
}
.container {
    background: white;
    padding: 30px;
    border-radius: 8px;
    box-shadow: 0 2px 10px rgba(0,0,0,0.1);
}
h1 {
    color: #2c3e50;
    border-bottom: 3px solid #3498db;
    padding-bottom: 10px;
}
h2 {
    color: #34495e;
    margin-top: 30px;
}
table {
    width: 100%;
    border-collapse: collapse;
    margin: 20px 0;
}
th, td {
    border: 1px solid #ddd;
    padding: 12px;
    text-align: left;
}
th {
    background-color: #3498db;
    color: white;
    font-weight: bold;
}
tr:nth-child(even) {
    background-color: #f2f2f2;
}
.priority-high { color: #e74c3c; font-weight: bold; }
.priority-medium { color: #f39c12; font-weight: bold; }
.priority-low { color: #27ae60; font-weight: bold; }
.status-resolved { color: #27ae60; font-weight: bold; }
.status-investigating { color: #f39c12; font-weight: bold; }
.status-monitoring { color: #3498db; font-weight: bold; }
ul {
    margin: 10px 0;
    padding-left: 20px;
}
li {
    margin: 5px 0;
}
.metadata {
    background-color: #ecf0f1;
    padding: 15px;
    border-radius: 5px;
    margin: 20px 0;
}
.section {
    margin-bottom: 30px;
    border-bottom: 1px solid #eee;
    padding-bottom: 20px;
}
.placeholder {
    color: #7f8c8d;
    font-style: italic;
}
"#;

/// Section body shapes shared by both output formats.
enum SectionBody<'a> {
    Paragraphs(&'a str),
    Bullets(&'a [String]),
    Timeline(&'a [TimelineItem]),
    Tags(&'a BTreeSet<String>),
}

impl SectionBody<'_> {
    fn is_empty(&self) -> bool {
        match self {
            SectionBody::Paragraphs(text) => text.trim().is_empty(),
            SectionBody::Bullets(items) => items.is_empty(),
            SectionBody::Timeline(items) => items.is_empty(),
            SectionBody::Tags(tags) => tags.is_empty(),
        }
    }
}

/// Every report section in output order. Both renderers walk this list, so
/// the two documents always carry the same content.
fn report_sections(report: &IncidentReport) -> [(&'static str, SectionBody<'_>); 8] {
    [
        ("Summary", SectionBody::Paragraphs(&report.summary)),
        ("Timeline", SectionBody::Timeline(&report.timeline)),
        ("Impact", SectionBody::Bullets(&report.impact)),
        ("Root Cause", SectionBody::Paragraphs(&report.root_cause)),
        ("Remediation", SectionBody::Bullets(&report.remediation)),
        ("What Went Well", SectionBody::Bullets(&report.went_well)),
        ("What Went Wrong", SectionBody::Bullets(&report.went_wrong)),
        ("Tags", SectionBody::Tags(&report.tags)),
    ]
}

fn metadata_rows(report: &IncidentReport) -> [(&'static str, String); 10] {
    [
        ("Generated on", report.generated_at.clone()),
        ("Incident Date", report.incident_date.clone()),
        ("Author", or_placeholder(&report.author)),
        ("Priority", report.priority.label().to_string()),
        ("Status", or_placeholder(&report.status)),
        ("Description", or_placeholder(&report.description)),
        ("Category", or_placeholder(&report.category)),
        ("Environment", or_placeholder(&report.environment)),
        ("Affected Resource(s)", or_placeholder(&report.affected_resources)),
        ("Participants", or_placeholder(&report.participants.join(", "))),
    ]
}

fn or_placeholder(value: &str) -> String {
    if value.trim().is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        value.to_string()
    }
}

pub fn render_report(report: &IncidentReport) -> RenderedReport {
    RenderedReport {
        html: render_html(report),
        markdown: render_markdown(report),
    }
}

pub fn render_markdown(report: &IncidentReport) -> String {
    let mut md = format!("# {}\n\n", single_line(&report.title));

    let rows = metadata_rows(report);
    for (idx, (label, value)) in rows.iter().enumerate() {
        let line_break = if idx + 1 < rows.len() { "  " } else { "" };
        md.push_str(&format!("**{}:** {}{}\n", label, single_line(value), line_break));
    }

    for (heading, body) in report_sections(report) {
        md.push_str(&format!("\n## {}\n\n", heading));
        if body.is_empty() {
            md.push_str(&format!("_{}_\n", EMPTY_PLACEHOLDER));
            continue;
        }
        match body {
            SectionBody::Paragraphs(text) => {
                md.push_str(text.trim());
                md.push('\n');
            }
            SectionBody::Bullets(items) => {
                for item in items {
                    md.push_str(&format!("- {}\n", single_line(item)));
                }
            }
            SectionBody::Timeline(items) => {
                md.push_str("| Time | Event |\n| --- | --- |\n");
                for item in items {
                    md.push_str(&format!(
                        "| {} | {} |\n",
                        markdown_cell(item.timestamp_display.as_deref().unwrap_or(MISSING_TIME)),
                        markdown_cell(&item.description)
                    ));
                }
            }
            SectionBody::Tags(tags) => {
                let tags: Vec<String> = tags.iter().map(|t| format!("`{}`", t)).collect();
                md.push_str(&tags.join(", "));
                md.push('\n');
            }
        }
    }

    md
}

pub fn render_html(report: &IncidentReport) -> String {
    let title = escape_html(&report.title);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str(&format!("<title>{}</title>\n", title));
    html.push_str(&format!("<style>\n{}</style>\n", REPORT_STYLESHEET));
    html.push_str("</head>\n<body>\n<div class=\"container\">\n");
    html.push_str(&format!("<h1>{}</h1>\n", title));

    html.push_str("<div class=\"metadata\">\n");
    let rows = metadata_rows(report);
    for (idx, (label, value)) in rows.iter().enumerate() {
        let value = match *label {
            "Priority" => format!(
                "<span class=\"{}\">{}</span>",
                priority_class(report.priority),
                escape_html(value)
            ),
            "Status" => match status_class(&report.status) {
                Some(class) => format!("<span class=\"{}\">{}</span>", class, escape_html(value)),
                None => escape_html(value),
            },
            _ => escape_html(value),
        };
        let line_break = if idx + 1 < rows.len() { "<br>" } else { "" };
        html.push_str(&format!(
            "<strong>{}:</strong> {}{}\n",
            label, value, line_break
        ));
    }
    html.push_str("</div>\n");

    for (heading, body) in report_sections(report) {
        html.push_str("<div class=\"section\">\n");
        html.push_str(&format!("<h2>{}</h2>\n", heading));
        if body.is_empty() {
            html.push_str(&format!(
                "<p class=\"placeholder\">{}</p>\n",
                EMPTY_PLACEHOLDER
            ));
            html.push_str("</div>\n");
            continue;
        }
        match body {
            SectionBody::Paragraphs(text) => {
                for paragraph in text.split("\n\n").filter(|p| !p.trim().is_empty()) {
                    html.push_str(&format!("<p>{}</p>\n", escape_html(paragraph.trim())));
                }
            }
            SectionBody::Bullets(items) => {
                html.push_str("<ul>\n");
                for item in items {
                    html.push_str(&format!("<li>{}</li>\n", escape_html(item)));
                }
                html.push_str("</ul>\n");
            }
            SectionBody::Timeline(items) => {
                html.push_str("<table>\n<tr><th>Time</th><th>Event</th></tr>\n");
                for item in items {
                    html.push_str(&format!(
                        "<tr><td>{}</td><td>{}</td></tr>\n",
                        escape_html(item.timestamp_display.as_deref().unwrap_or(MISSING_TIME)),
                        escape_html(&item.description)
                    ));
                }
                html.push_str("</table>\n");
            }
            SectionBody::Tags(tags) => {
                let tags: Vec<String> = tags
                    .iter()
                    .map(|t| format!("<code>{}</code>", escape_html(t)))
                    .collect();
                html.push_str(&format!("<p>{}</p>\n", tags.join(", ")));
            }
        }
        html.push_str("</div>\n");
    }

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn priority_class(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "priority-high",
        Priority::Medium => "priority-medium",
        Priority::Low => "priority-low",
    }
}

fn status_class(status: &str) -> Option<&'static str> {
    match status {
        "Resolved" => Some("status-resolved"),
        "Investigating" => Some("status-investigating"),
        "Monitoring" => Some("status-monitoring"),
        _ => None,
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn markdown_cell(text: &str) -> String {
    single_line(text).replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> IncidentReport {
        IncidentReport {
            title: "Jenkins <Storage> Full".to_string(),
            incident_date: "2025-01-22".to_string(),
            generated_at: "2025-02-01 09:00:00".to_string(),
            author: "Yuga".to_string(),
            priority: Priority::High,
            status: "Resolved".to_string(),
            category: "Infrastructure".to_string(),
            environment: "Production".to_string(),
            affected_resources: "Jenkins, Build agents".to_string(),
            description: "Jenkins ran out of disk space.".to_string(),
            summary: "Disk filled up.\n\nBuilds & deploys failed.".to_string(),
            timeline: vec![
                TimelineItem {
                    timestamp_display: Some("2025-01-22 15:30:45".to_string()),
                    description: "Ajay noticed a | in the path".to_string(),
                },
                TimelineItem {
                    timestamp_display: None,
                    description: "agent restarted".to_string(),
                },
            ],
            impact: vec!["builds blocked".to_string()],
            root_cause: "Old workspaces".to_string(),
            remediation: vec![],
            went_well: vec!["fast response".to_string()],
            went_wrong: vec![],
            tags: ["jenkins", "ci"].iter().map(|t| t.to_string()).collect(),
            participants: vec!["Ajay".to_string(), "Yuga".to_string()],
        }
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let report = sample_report();
        assert_eq!(render_report(&report), render_report(&report));
    }

    #[test]
    fn test_html_escapes_text() {
        let html = render_html(&sample_report());
        assert!(html.contains("<h1>Jenkins &lt;Storage&gt; Full</h1>"));
        assert!(html.contains("<p>Builds &amp; deploys failed.</p>"));
        assert!(!html.contains("<Storage>"));
        assert!(html.contains("<span class=\"priority-high\">High</span>"));
        assert!(html.contains("<span class=\"status-resolved\">Resolved</span>"));
    }

    #[test]
    fn test_timeline_table_in_both_formats() {
        let rendered = render_report(&sample_report());
        assert!(rendered
            .markdown
            .contains("| 2025-01-22 15:30:45 | Ajay noticed a \\| in the path |"));
        assert!(rendered.markdown.contains("| - | agent restarted |"));
        assert!(rendered
            .html
            .contains("<tr><td>-</td><td>agent restarted</td></tr>"));
    }

    #[test]
    fn test_every_section_present_in_both_formats() {
        let rendered = render_report(&sample_report());
        for heading in [
            "Summary",
            "Timeline",
            "Impact",
            "Root Cause",
            "Remediation",
            "What Went Well",
            "What Went Wrong",
            "Tags",
        ] {
            assert!(rendered.markdown.contains(&format!("## {}\n", heading)));
            assert!(rendered.html.contains(&format!("<h2>{}</h2>", heading)));
        }
        // remediation and went_wrong are empty
        assert_eq!(rendered.markdown.matches(EMPTY_PLACEHOLDER).count(), 2);
        assert_eq!(rendered.html.matches(EMPTY_PLACEHOLDER).count(), 2);
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let md = render_markdown(&sample_report());
        let summary = md.find("## Summary").unwrap();
        let timeline = md.find("## Timeline").unwrap();
        let tags = md.find("## Tags").unwrap();
        assert!(summary < timeline && timeline < tags);
        assert!(md.ends_with("`ci`, `jenkins`\n"));
    }

    #[test]
    fn test_markdown_metadata_block() {
        let md = render_markdown(&sample_report());
        assert!(md.starts_with(
            "# Jenkins <Storage> Full\n\n\
             **Generated on:** 2025-02-01 09:00:00  \n\
             **Incident Date:** 2025-01-22  \n\
             **Author:** Yuga  \n\
             **Priority:** High  \n\
             **Status:** Resolved  \n\
             **Description:** Jenkins ran out of disk space.  \n\
             **Category:** Infrastructure  \n\
             **Environment:** Production  \n\
             **Affected Resource(s):** Jenkins, Build agents  \n\
             **Participants:** Ajay, Yuga\n"
        ));
    }

    #[test]
    fn test_missing_ownership_fields_use_placeholder() {
        let mut report = sample_report();
        report.author = String::new();
        report.affected_resources = "  ".to_string();
        let rendered = render_report(&report);
        assert!(rendered.markdown.contains("**Author:** None reported.  \n"));
        assert!(rendered
            .html
            .contains("<strong>Affected Resource(s):</strong> None reported.<br>"));
        // the two empty metadata rows plus remediation and went_wrong
        assert_eq!(rendered.markdown.matches(EMPTY_PLACEHOLDER).count(), 4);
        assert_eq!(rendered.html.matches(EMPTY_PLACEHOLDER).count(), 4);
    }

    #[test]
    fn test_empty_status_uses_placeholder() {
        let mut report = sample_report();
        report.status = String::new();
        let html = render_html(&report);
        assert!(html.contains("<strong>Status:</strong> None reported.<br>"));
    }
}
