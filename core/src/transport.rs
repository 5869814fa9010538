use std::time::Duration;

use ureq::http::Response;
use ureq::Body;

/// Status code and body text of a completed HTTP exchange.
#[derive(Debug)]
pub(crate) struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking agent with a global per-request timeout. Non-2xx statuses are
/// returned as replies so callers can read the error body.
pub(crate) fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .new_agent()
}

pub(crate) fn read_reply(
    result: Result<Response<Body>, ureq::Error>,
) -> Result<HttpReply, ureq::Error> {
    let mut response = result?;
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;
    Ok(HttpReply { status, body })
}
