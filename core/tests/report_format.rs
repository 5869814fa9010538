use incident_report_core::incident::model::NormalizedEntry;
use incident_report_core::incident::render::{render_report, EMPTY_PLACEHOLDER};
use incident_report_core::incident::response::parse_incident_response;
use incident_report_core::incident::writer::report_file_stem;
use incident_report_core::slack::thread_ref::parse_thread_ref;

fn transcript() -> Vec<NormalizedEntry> {
    vec![NormalizedEntry {
        author_name: "Ajay".to_string(),
        timestamp_display: "2025-01-22 15:10:45".to_string(),
        text: "storage is full on jenkins".to_string(),
    }]
}

#[test]
fn permalink_token_maps_to_thread_ts() {
    let thread = parse_thread_ref("p1737558645123456").unwrap();
    assert_eq!(thread.thread_ts, "1737558645.123456");
    assert_eq!(thread.channel_id, None);
}

#[test]
fn parsed_partial_answer_renders_every_section() {
    let report = parse_incident_response(
        "IMPACT:\n- service down\n- users affected",
        &transcript(),
        "2025-02-01 09:00:00",
    )
    .unwrap();
    assert_eq!(report.impact, vec!["service down", "users affected"]);
    assert!(report.tags.is_empty());

    let rendered = render_report(&report);
    // six empty metadata rows plus the seven empty sections
    assert_eq!(rendered.markdown.matches(EMPTY_PLACEHOLDER).count(), 13);
    assert_eq!(rendered.html.matches(EMPTY_PLACEHOLDER).count(), 13);
    assert_eq!(render_report(&report), rendered);
}

#[test]
fn stem_matches_title_and_date() {
    assert_eq!(
        report_file_stem("2025-01-22", "Storage Issue!!"),
        "2025-01-22_Storage_Issue"
    );
}
