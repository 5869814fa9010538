use crate::error::{CoreError, CoreResult};
use regex::{Captures, Regex};

fn compile(pattern: &str) -> CoreResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| CoreError::InvalidInput(format!("markup pattern failed to compile: {}", e)))
}

/// Chat text is untrusted: NUL bytes break downstream renderers, so they
/// are removed before anything else looks at the text.
pub fn sanitize_untrusted_text(raw: &str) -> String {
    raw.replace('\0', "")
}

/// Compiled Slack mrkdwn patterns, built once per run.
pub struct MarkupStripper {
    angle_token: Regex,
    emphasis: [Regex; 3],
    code: Regex,
}

impl MarkupStripper {
    pub fn new() -> CoreResult<Self> {
        Ok(Self {
            angle_token: compile(r"<([^<>\s][^<>]*)>")?,
            emphasis: [
                compile(r"(^|[^\w*])\*([^*\n]+)\*")?,
                compile(r"(^|[^\w_])_([^_\n]+)_")?,
                compile(r"(^|[^\w~])~([^~\n]+)~")?,
            ],
            code: compile(r"`{1,3}([^`]*)`{1,3}")?,
        })
    }

    /// Reduce Slack mrkdwn to plain text. `resolve_user` maps a user id found
    /// in a mention to the name that replaces it.
    pub fn strip<F>(&self, raw: &str, mut resolve_user: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let text = sanitize_untrusted_text(raw);
        let text = self.angle_token.replace_all(&text, |caps: &Captures| {
            rewrite_angle_token(&caps[1], &mut resolve_user)
        });
        let mut text = decode_entities(&text);
        for re in &self.emphasis {
            text = re.replace_all(&text, "$1$2").into_owned();
        }
        let text = self.code.replace_all(&text, "$1");
        collapse_whitespace(&text)
    }
}

fn rewrite_angle_token<F>(inner: &str, resolve_user: &mut F) -> String
where
    F: FnMut(&str) -> String,
{
    let (target, label) = match inner.split_once('|') {
        Some((t, l)) => (t.trim(), Some(l.trim()).filter(|l| !l.is_empty())),
        None => (inner.trim(), None),
    };

    if let Some(user_id) = target.strip_prefix('@') {
        return resolve_user(user_id);
    }
    if let Some(channel_id) = target.strip_prefix('#') {
        return format!("#{}", label.unwrap_or(channel_id));
    }
    if let Some(special) = target.strip_prefix('!') {
        return match special {
            "here" | "channel" | "everyone" => format!("@{}", special),
            _ if special.starts_with("subteam^") => label.unwrap_or("@group").to_string(),
            // <!date^...|fallback> and friends carry readable fallback text.
            _ => label.unwrap_or_default().to_string(),
        };
    }

    let url = target.strip_prefix("mailto:").unwrap_or(target);
    label.unwrap_or(url).to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_slack_markup(raw: &str, resolve: fn(&str) -> String) -> String {
        MarkupStripper::new().unwrap().strip(raw, resolve)
    }

    fn names(id: &str) -> String {
        match id {
            "U1" => "Alice".to_string(),
            other => other.to_string(),
        }
    }

    #[test]
    fn test_nul_bytes_removed() {
        assert_eq!(sanitize_untrusted_text("hello\0world"), "helloworld");
    }

    #[test]
    fn test_mentions_resolved() {
        assert_eq!(
            strip_slack_markup("<@U1> can you check?", names),
            "Alice can you check?"
        );
        assert_eq!(strip_slack_markup("cc <@U9|bob>", names), "cc U9");
    }

    #[test]
    fn test_links_unwrapped() {
        assert_eq!(
            strip_slack_markup("see <https://status.example.com|status page>", names),
            "see status page"
        );
        assert_eq!(
            strip_slack_markup("see <https://jenkins.example.com/job/1>", names),
            "see https://jenkins.example.com/job/1"
        );
        assert_eq!(
            strip_slack_markup("mail <mailto:ops@example.com>", names),
            "mail ops@example.com"
        );
    }

    #[test]
    fn test_channels_and_specials() {
        assert_eq!(
            strip_slack_markup("<!here> moving to <#C123|incidents>", names),
            "@here moving to #incidents"
        );
        assert_eq!(strip_slack_markup("<#C123>", names), "#C123");
        assert_eq!(
            strip_slack_markup("<!subteam^S1|@oncall> ping", names),
            "@oncall ping"
        );
    }

    #[test]
    fn test_emphasis_and_code_unwrapped() {
        assert_eq!(
            strip_slack_markup("*disk* is _full_ ~maybe~ run `df -h`", names),
            "disk is full maybe run df -h"
        );
        assert_eq!(
            strip_slack_markup("keep snake_case_names", names),
            "keep snake_case_names"
        );
    }

    #[test]
    fn test_entities_and_whitespace() {
        assert_eq!(
            strip_slack_markup("  a &lt;b&gt;  &amp;\n\n c ", names),
            "a <b> & c"
        );
    }

    #[test]
    fn test_markup_only_message_becomes_empty() {
        assert_eq!(strip_slack_markup("<!date^1700000000^{date}>", names), "");
    }
}
