use super::model::{NormalizedEntry, Priority};
use super::sanitize::MarkupStripper;
use crate::error::{CoreError, CoreResult};
use crate::slack::client::ConversationApi;
use crate::slack::identity::IdentityResolver;
use crate::slack::model::RawMessage;
use std::collections::HashSet;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Turn raw thread messages into the sorted, markup-free transcript the
/// prompt and the parser work from.
pub fn normalize_transcript<A: ConversationApi + ?Sized>(
    messages: &[RawMessage],
    resolver: &mut IdentityResolver<'_, A>,
    offset: UtcOffset,
) -> CoreResult<Vec<NormalizedEntry>> {
    let stripper = MarkupStripper::new()?;

    // sort_by is stable: equal timestamps keep API order
    let mut ordered: Vec<&RawMessage> = messages.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(ordered.len());
    for message in ordered {
        if !seen.insert((message.author_id.as_str(), message.timestamp.to_bits())) {
            continue;
        }
        let text = stripper.strip(&message.text, |user_id| resolver.resolve(user_id));
        if text.is_empty() {
            continue;
        }
        let author_name = resolver.resolve(&message.author_id);
        entries.push(NormalizedEntry {
            author_name,
            timestamp_display: format_epoch(message.timestamp, offset)?,
            text,
        });
    }

    Ok(entries)
}

/// Fixed-width `YYYY-MM-DD HH:MM:SS` rendering of an epoch timestamp.
/// Sub-second precision is truncated.
pub fn format_epoch(epoch: f64, offset: UtcOffset) -> CoreResult<String> {
    if !epoch.is_finite() {
        return Err(CoreError::InvalidInput(format!(
            "timestamp {} is not a number",
            epoch
        )));
    }
    let instant = OffsetDateTime::from_unix_timestamp(epoch.floor() as i64)
        .map_err(|e| CoreError::InvalidInput(format!("timestamp {} out of range: {}", epoch, e)))?;
    format_display(instant.to_offset(offset))
}

/// `YYYY-MM-DD HH:MM:SS` for an instant already in the wanted offset.
pub fn format_display(instant: OffsetDateTime) -> CoreResult<String> {
    instant
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .map_err(|e| CoreError::InvalidInput(format!("instant {} not formattable: {}", instant, e)))
}

/// Distinct authors in order of first appearance.
pub fn participants(entries: &[NormalizedEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|e| seen.insert(e.author_name.as_str()))
        .map(|e| e.author_name.clone())
        .collect()
}

/// Keyword-based priority for threads where the model gave none.
pub fn infer_priority(entries: &[NormalizedEntry]) -> Priority {
    let text = entries
        .iter()
        .map(|e| e.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let high_keywords = ["critical", "error", "fail", "outage", "breach", "attack"];
    let medium_keywords = ["warn", "timeout", "retry", "denied", "rejected", "slow", "degraded"];

    if high_keywords.iter().any(|kw| text.contains(kw)) {
        Priority::High
    } else if medium_keywords.iter().any(|kw| text.contains(kw)) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::model::{SlackThread, SlackUser};

    struct Directory;

    impl ConversationApi for Directory {
        fn fetch_thread(&self, _: &str, _: &str) -> CoreResult<SlackThread> {
            Err(CoreError::ThreadNotFound("unused".to_string()))
        }

        fn lookup_user(&self, user_id: &str) -> CoreResult<SlackUser> {
            let real_name = match user_id {
                "u1" => "Alice",
                "u2" => "Bob",
                _ => return Err(CoreError::Transport("user_not_found".to_string())),
            };
            Ok(SlackUser {
                id: user_id.to_string(),
                real_name: Some(real_name.to_string()),
                ..Default::default()
            })
        }
    }

    fn raw(author: &str, timestamp: f64, text: &str) -> RawMessage {
        RawMessage {
            author_id: author.to_string(),
            timestamp,
            text: text.to_string(),
            thread_root: false,
        }
    }

    fn normalize(messages: &[RawMessage]) -> Vec<NormalizedEntry> {
        let mut resolver = IdentityResolver::new(&Directory);
        normalize_transcript(messages, &mut resolver, UtcOffset::UTC).unwrap()
    }

    #[test]
    fn test_two_message_thread_in_utc() {
        let entries = normalize(&[
            raw("u1", 1700000000.0, "deploy failed"),
            raw("u1", 1700000100.0, "rolled back"),
        ]);
        assert_eq!(
            entries,
            vec![
                NormalizedEntry {
                    author_name: "Alice".to_string(),
                    timestamp_display: "2023-11-14 22:13:20".to_string(),
                    text: "deploy failed".to_string(),
                },
                NormalizedEntry {
                    author_name: "Alice".to_string(),
                    timestamp_display: "2023-11-14 22:15:00".to_string(),
                    text: "rolled back".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_out_of_order_input_sorted() {
        let entries = normalize(&[
            raw("u2", 1700000300.5, "third"),
            raw("u1", 1700000100.0, "first"),
            raw("u2", 1700000200.0, "second"),
        ]);
        let texts: Vec<_> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert!(entries
            .windows(2)
            .all(|w| w[0].timestamp_display <= w[1].timestamp_display));
    }

    #[test]
    fn test_equal_timestamps_keep_api_order() {
        let entries = normalize(&[
            raw("u1", 1700000000.0, "alpha"),
            raw("u2", 1700000000.0, "beta"),
        ]);
        assert_eq!(entries[0].text, "alpha");
        assert_eq!(entries[1].text, "beta");
    }

    #[test]
    fn test_empty_and_duplicate_messages_dropped() {
        let entries = normalize(&[
            raw("u1", 1700000000.0, "disk full"),
            raw("u1", 1700000000.0, "disk full"),
            raw("u2", 1700000050.0, "   "),
            raw("u2", 1700000060.0, "<!date^1700000000^{date}>"),
        ]);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_mentions_and_unknown_authors_resolved() {
        let entries = normalize(&[raw("u9", 1700000000.0, "<@u2> please look")]);
        assert_eq!(entries[0].author_name, "u9");
        assert_eq!(entries[0].text, "Bob please look");
    }

    #[test]
    fn test_normalization_deterministic() {
        let messages = vec![
            raw("u2", 1700000200.0, "*restarted* the <https://ci.example.com|runner>"),
            raw("u1", 1700000100.0, "jenkins disk at 100%"),
        ];
        assert_eq!(normalize(&messages), normalize(&messages));
    }

    #[test]
    fn test_configured_offset_applied() {
        let offset = UtcOffset::from_hms(5, 30, 0).unwrap();
        assert_eq!(
            format_epoch(1700000000.75, offset).unwrap(),
            "2023-11-15 03:43:20"
        );
        assert!(format_epoch(f64::NAN, UtcOffset::UTC).is_err());
    }

    #[test]
    fn test_participants_in_first_appearance_order() {
        let entries = normalize(&[
            raw("u2", 1700000000.0, "a"),
            raw("u1", 1700000001.0, "b"),
            raw("u2", 1700000002.0, "c"),
        ]);
        assert_eq!(participants(&entries), vec!["Bob", "Alice"]);
    }

    #[test]
    fn test_infer_priority_from_keywords() {
        let entries = normalize(&[raw("u1", 1700000000.0, "builds are slow")]);
        assert_eq!(infer_priority(&entries), Priority::Medium);
        let entries = normalize(&[raw("u1", 1700000000.0, "Total OUTAGE")]);
        assert_eq!(infer_priority(&entries), Priority::High);
        assert_eq!(infer_priority(&[]), Priority::Low);
    }
}
