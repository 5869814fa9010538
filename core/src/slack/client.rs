use crate::config::SlackSettings;
use crate::error::{CoreError, CoreResult};
use crate::slack::model::{
    RawMessage, RepliesResponse, SlackThread, SlackUser, ThreadMetadata, UserInfoResponse,
};
use crate::slack::thread_ref::ts_to_epoch;
use crate::transport::{http_agent, read_reply, HttpReply};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

const PAGE_LIMIT: &str = "200";
const MAX_PAGES: usize = 50;

/// `ok:false` codes meaning the thread is absent or not visible to the bot.
const THREAD_ACCESS_ERRORS: [&str; 5] = [
    "thread_not_found",
    "channel_not_found",
    "not_in_channel",
    "access_denied",
    "message_not_found",
];

/// The two conversation-API operations the pipeline consumes.
pub trait ConversationApi {
    fn fetch_thread(&self, channel_id: &str, thread_ts: &str) -> CoreResult<SlackThread>;
    fn lookup_user(&self, user_id: &str) -> CoreResult<SlackUser>;
}

/// Blocking Slack Web API client. Thread reads use the bot token, profile
/// lookups the user token.
pub struct SlackWebClient {
    agent: ureq::Agent,
    api_base: String,
    bot_token: SecretString,
    user_token: SecretString,
}

impl SlackWebClient {
    pub fn new(
        api_base: &str,
        bot_token: SecretString,
        user_token: SecretString,
        timeout: Duration,
    ) -> Self {
        Self {
            agent: http_agent(timeout),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            user_token,
        }
    }

    pub fn from_settings(settings: &SlackSettings, timeout: Duration) -> Self {
        Self::new(
            &settings.api_base,
            SecretString::new(settings.bot_token.expose_secret().into()),
            SecretString::new(settings.user_token.expose_secret().into()),
            timeout,
        )
    }

    fn get(&self, method: &str, token: &SecretString, query: &[(&str, &str)]) -> CoreResult<String> {
        let url = format!("{}/{}", self.api_base, method);
        let mut request = self
            .agent
            .get(&url)
            .header("Authorization", &format!("Bearer {}", token.expose_secret()))
            .header("Accept", "application/json");
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let reply: HttpReply = read_reply(request.call())
            .map_err(|e| CoreError::Transport(format!("slack {} request failed: {}", method, e)))?;
        if !reply.is_success() {
            return Err(CoreError::Transport(format!(
                "slack {} returned HTTP {}",
                method, reply.status
            )));
        }
        Ok(reply.body)
    }
}

impl ConversationApi for SlackWebClient {
    fn fetch_thread(&self, channel_id: &str, thread_ts: &str) -> CoreResult<SlackThread> {
        info!(channel = channel_id, thread_ts, "fetching slack thread");
        let mut collector = ThreadCollector::new(thread_ts);
        let mut cursor: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut query = vec![
                ("channel", channel_id),
                ("ts", thread_ts),
                ("limit", PAGE_LIMIT),
            ];
            if let Some(c) = cursor.as_deref() {
                query.push(("cursor", c));
            }
            let body = self.get("conversations.replies", &self.bot_token, &query)?;
            let replies = decode_replies_page(&body)?;
            debug!(page, messages = replies.messages.len(), "received replies page");

            let next = replies
                .response_metadata
                .as_ref()
                .and_then(|m| m.next_cursor.clone())
                .filter(|c| !c.is_empty());
            let has_more = replies.has_more;
            collector.absorb(replies);

            cursor = next.filter(|_| has_more);
            if cursor.is_none() {
                break;
            }
        }
        if cursor.is_some() {
            warn!(max_pages = MAX_PAGES, "thread pagination stopped at page limit");
        }

        collector.finish(channel_id)
    }

    fn lookup_user(&self, user_id: &str) -> CoreResult<SlackUser> {
        let body = self.get("users.info", &self.user_token, &[("user", user_id)])?;
        decode_user_info(&body)
    }
}

/// Accumulates replies pages, skipping the root message Slack repeats on
/// every page.
struct ThreadCollector {
    thread_ts: String,
    seen_ts: HashSet<String>,
    messages: Vec<RawMessage>,
    reply_count: u32,
}

impl ThreadCollector {
    fn new(thread_ts: &str) -> Self {
        Self {
            thread_ts: thread_ts.to_string(),
            seen_ts: HashSet::new(),
            messages: Vec::new(),
            reply_count: 0,
        }
    }

    fn absorb(&mut self, page: RepliesResponse) {
        for wire in page.messages {
            if !self.seen_ts.insert(wire.ts.clone()) {
                continue;
            }
            let Some(timestamp) = ts_to_epoch(&wire.ts) else {
                warn!(ts = %wire.ts, "skipping message with unparseable timestamp");
                continue;
            };
            let thread_root = wire.ts == self.thread_ts;
            if thread_root {
                self.reply_count = wire.reply_count.unwrap_or(0);
            }
            let author_id = wire
                .user
                .or(wire.bot_id)
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| "unknown_user".to_string());
            self.messages.push(RawMessage {
                author_id,
                timestamp,
                text: wire.text,
                thread_root,
            });
        }
    }

    fn finish(self, channel_id: &str) -> CoreResult<SlackThread> {
        if self.messages.is_empty() {
            return Err(CoreError::ThreadNotFound(format!(
                "no messages in thread {} of channel {}",
                self.thread_ts, channel_id
            )));
        }
        Ok(SlackThread {
            metadata: ThreadMetadata {
                channel_id: channel_id.to_string(),
                thread_ts: self.thread_ts,
                reply_count: self.reply_count,
                message_count: self.messages.len(),
            },
            messages: self.messages,
        })
    }
}

fn slack_failure(method: &str, code: Option<String>) -> CoreError {
    let code = code.unwrap_or_else(|| "unknown_error".to_string());
    if THREAD_ACCESS_ERRORS.contains(&code.as_str()) {
        CoreError::ThreadNotFound(format!("slack {} answered {}", method, code))
    } else {
        CoreError::Transport(format!("slack {} failed: {}", method, code))
    }
}

pub(crate) fn decode_replies_page(body: &str) -> CoreResult<RepliesResponse> {
    let page: RepliesResponse = serde_json::from_str(body).map_err(|e| {
        CoreError::Transport(format!("conversations.replies returned invalid JSON: {}", e))
    })?;
    if !page.ok {
        return Err(slack_failure("conversations.replies", page.error));
    }
    Ok(page)
}

pub(crate) fn decode_user_info(body: &str) -> CoreResult<SlackUser> {
    let info: UserInfoResponse = serde_json::from_str(body)
        .map_err(|e| CoreError::Transport(format!("users.info returned invalid JSON: {}", e)))?;
    if !info.ok {
        return Err(slack_failure("users.info", info.error));
    }
    info.user
        .map(SlackUser::from)
        .ok_or_else(|| CoreError::Transport("users.info returned no user".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_ONE: &str = r#"{
        "ok": true,
        "has_more": true,
        "messages": [
            {"ts": "1737558645.123456", "user": "U1", "text": "storage is full on jenkins", "reply_count": 2},
            {"ts": "1737558700.000100", "user": "U2", "text": "looking"}
        ],
        "response_metadata": {"next_cursor": "bmV4dA=="}
    }"#;

    const PAGE_TWO: &str = r#"{
        "ok": true,
        "has_more": false,
        "messages": [
            {"ts": "1737558645.123456", "user": "U1", "text": "storage is full on jenkins", "reply_count": 2},
            {"ts": "1737558800.000200", "bot_id": "B1", "text": "cleanup job finished"}
        ],
        "response_metadata": {"next_cursor": ""}
    }"#;

    #[test]
    fn test_collector_merges_pages_and_skips_repeated_root() {
        let mut collector = ThreadCollector::new("1737558645.123456");
        collector.absorb(decode_replies_page(PAGE_ONE).unwrap());
        collector.absorb(decode_replies_page(PAGE_TWO).unwrap());
        let thread = collector.finish("C1").unwrap();

        assert_eq!(thread.metadata.message_count, 3);
        assert_eq!(thread.metadata.reply_count, 2);
        assert!(thread.messages[0].thread_root);
        assert!(!thread.messages[1].thread_root);
        assert_eq!(thread.messages[2].author_id, "B1");
    }

    #[test]
    fn test_access_errors_map_to_thread_not_found() {
        for code in ["thread_not_found", "channel_not_found", "not_in_channel"] {
            let body = format!(r#"{{"ok": false, "error": "{}"}}"#, code);
            assert!(matches!(
                decode_replies_page(&body),
                Err(CoreError::ThreadNotFound(_))
            ));
        }
    }

    #[test]
    fn test_other_errors_map_to_transport() {
        assert!(matches!(
            decode_replies_page(r#"{"ok": false, "error": "invalid_auth"}"#),
            Err(CoreError::Transport(_))
        ));
        assert!(matches!(
            decode_replies_page("<html>"),
            Err(CoreError::Transport(_))
        ));
    }

    #[test]
    fn test_empty_thread_is_not_found() {
        let collector = ThreadCollector::new("1.0");
        assert!(matches!(
            collector.finish("C1"),
            Err(CoreError::ThreadNotFound(_))
        ));
    }

    #[test]
    fn test_decode_user_info() {
        let user = decode_user_info(
            r#"{"ok": true, "user": {"id": "U1", "name": "ajay", "real_name": "Ajay Kumar"}}"#,
        )
        .unwrap();
        assert_eq!(user.preferred_name().as_deref(), Some("Ajay Kumar"));
        assert!(decode_user_info(r#"{"ok": false, "error": "user_not_found"}"#).is_err());
    }
}
