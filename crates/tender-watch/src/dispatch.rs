//! Forward notices to the webhook, one at a time.

use crate::config::{DISPATCH_INTERVAL, DISPATCH_TIMEOUT};
use crate::rate_limit::{IntervalLimiter, RateLimiter};
use crate::types::Notice;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

/// Longest slice of a rejection body kept for logs.
const MAX_BODY_CHARS: usize = 200;

/// What happened to one notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The webhook answered 200.
    Accepted,
    /// The webhook answered with anything else.
    Rejected { status: u16, body: String },
    /// The request never got an answer.
    Transport(String),
}

/// Per-batch counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchTally {
    pub accepted: usize,
    pub rejected: usize,
    pub transport_errors: usize,
}

impl DispatchTally {
    pub fn failed(&self) -> usize {
        self.rejected + self.transport_errors
    }

    pub fn attempted(&self) -> usize {
        self.accepted + self.failed()
    }

    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Accepted => self.accepted += 1,
            DispatchOutcome::Rejected { .. } => self.rejected += 1,
            DispatchOutcome::Transport(_) => self.transport_errors += 1,
        }
    }
}

/// Posts notices as JSON to a single endpoint.
pub struct Dispatcher {
    client: reqwest::Client,
    endpoint: Url,
    limiter: Box<dyn RateLimiter>,
}

impl Dispatcher {
    /// Dispatcher with the standard spacing between calls.
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self::with_limiter(client, endpoint, Box::new(IntervalLimiter::new(DISPATCH_INTERVAL)))
    }

    pub fn with_limiter(
        client: reqwest::Client,
        endpoint: Url,
        limiter: Box<dyn RateLimiter>,
    ) -> Self {
        Self {
            client,
            endpoint,
            limiter,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST one notice. Does not wait on the rate limiter.
    pub async fn send(&self, notice: &Notice) -> DispatchOutcome {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .timeout(DISPATCH_TIMEOUT)
            .json(notice)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().as_u16() == 200 => DispatchOutcome::Accepted,
            Ok(r) => {
                let status = r.status().as_u16();
                let body = r.text().await.unwrap_or_default();
                DispatchOutcome::Rejected {
                    status,
                    body: body.chars().take(MAX_BODY_CHARS).collect(),
                }
            }
            Err(e) => DispatchOutcome::Transport(e.to_string()),
        }
    }

    /// Send every notice in order, waiting on the rate limiter before each
    /// call. A failed send never stops the batch.
    pub async fn dispatch_all(&self, notices: &[Notice]) -> DispatchTally {
        let mut tally = DispatchTally::default();
        for notice in notices {
            self.limiter.acquire().await;
            let outcome = self.send(notice).await;
            match &outcome {
                DispatchOutcome::Accepted => {
                    info!(case_id = %notice.id, city = %notice.city, "notice delivered");
                }
                DispatchOutcome::Rejected { status, body } => {
                    warn!(case_id = %notice.id, status, body = %body, "webhook rejected notice");
                }
                DispatchOutcome::Transport(err) => {
                    warn!(case_id = %notice.id, error = %err, "webhook unreachable");
                }
            }
            tally.record(&outcome);
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts() {
        let mut t = DispatchTally::default();
        t.record(&DispatchOutcome::Accepted);
        t.record(&DispatchOutcome::Rejected {
            status: 500,
            body: String::new(),
        });
        t.record(&DispatchOutcome::Transport("refused".to_string()));
        t.record(&DispatchOutcome::Accepted);
        assert_eq!(t.accepted, 2);
        assert_eq!(t.failed(), 2);
        assert_eq!(t.attempted(), 4);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = reqwest::Client::new();
        // Port 9 (discard) is closed on test machines.
        let endpoint = Url::parse("http://127.0.0.1:9/hook").unwrap();
        let dispatcher =
            Dispatcher::with_limiter(client, endpoint, Box::new(crate::rate_limit::Unlimited));
        let notice = Notice {
            id: "A1".to_string(),
            title: "t".to_string(),
            org: "o".to_string(),
            city: "新北市".to_string(),
            budget: 1,
            reason: "r".to_string(),
        };
        let tally = dispatcher.dispatch_all(&[notice.clone(), notice]).await;
        assert_eq!(tally.transport_errors, 2);
        assert_eq!(tally.accepted, 0);
    }
}
