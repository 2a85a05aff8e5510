//! Client for the CAPTCHA solving service (2Captcha wire protocol).
//!
//! The service offers no blocking "solve" call; a submission registers the
//! challenge and returns a job id, and the caller polls for the token. This
//! client owns that submit-then-poll loop: poll on a fixed interval, stop
//! the moment the service gives a definitive rejection, and give up at a
//! hard ceiling so a transaction can never hang on an unsolved challenge.

use std::borrow::Cow;
use std::time::Duration;

use consta_common::{EngineError, Result};
use consta_http::{HttpClient, HttpError, RequestOpts};
use serde::Deserialize;
use tokio::time::{sleep, Instant};

const NOT_READY: &str = "CAPCHA_NOT_READY";

/// Settings for the solving service connection and polling cadence.
///
/// Defaults match the production service: poll every 5 seconds, give up
/// after two minutes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Account secret. Travels only as a query parameter; the HTTP layer
    /// redacts it from logs.
    pub api_key: String,
    pub base_url: String,
    pub poll_interval_secs: u64,
    pub poll_ceiling_secs: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://2captcha.com".to_string(),
            poll_interval_secs: 5,
            poll_ceiling_secs: 120,
        }
    }
}

/// Every service reply uses the same two-field envelope.
#[derive(Debug, Deserialize)]
struct ServiceReply {
    status: u8,
    request: String,
}

#[derive(Debug)]
enum PollOutcome {
    NotReady,
    Token(String),
}

#[derive(Clone, Debug)]
pub struct SolverClient {
    http: HttpClient,
    api_key: String,
    poll_interval: Duration,
    poll_ceiling: Duration,
}

impl SolverClient {
    pub fn new(config: &SolverConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EngineError::Config(
                "solver api_key is not set".to_string(),
            ));
        }
        let http = HttpClient::new(&config.base_url).map_err(http_to_engine)?;
        Ok(Self {
            http,
            api_key: config.api_key.trim().to_string(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            poll_ceiling: Duration::from_secs(config.poll_ceiling_secs),
        })
    }

    /// Obtain a reCAPTCHA token for the given site key and page.
    ///
    /// Fails with [`EngineError::SolverRejected`] when the service reports
    /// the job itself as invalid (bad key, unsolvable challenge), and with
    /// [`EngineError::SolverTimeout`] when no token arrives within the
    /// polling ceiling. A rejection stops polling immediately; there is no
    /// point asking again after a definitive answer.
    pub async fn solve_recaptcha(&self, site_key: &str, page_url: &str) -> Result<String> {
        let job_id = self.submit_recaptcha(site_key, page_url).await?;
        tracing::debug!(job_id=%job_id, "solver.submitted");

        let deadline = Instant::now() + self.poll_ceiling;
        let mut polls = 0u32;
        loop {
            sleep(self.poll_interval).await;
            polls += 1;
            match self.poll(&job_id).await? {
                PollOutcome::Token(token) => {
                    tracing::info!(job_id=%job_id, polls, "solver.solved");
                    return Ok(token);
                }
                PollOutcome::NotReady => {
                    tracing::debug!(job_id=%job_id, polls, "solver.not_ready");
                    if Instant::now() >= deadline {
                        tracing::warn!(job_id=%job_id, polls, "solver.timeout");
                        return Err(EngineError::SolverTimeout(self.poll_ceiling.as_secs()));
                    }
                }
            }
        }
    }

    /// Current account balance, in the service's currency.
    ///
    /// Cheap liveness check for the configured credentials.
    pub async fn balance(&self) -> Result<f64> {
        let query: Vec<(&str, Cow<'_, str>)> = vec![
            ("key", Cow::Borrowed(self.api_key.as_str())),
            ("action", Cow::Borrowed("getbalance")),
            ("json", Cow::Borrowed("1")),
        ];
        let reply: ServiceReply = self
            .http
            .get_json(
                "res.php",
                RequestOpts {
                    query: Some(query),
                    ..Default::default()
                },
            )
            .await
            .map_err(http_to_engine)?;

        if reply.status != 1 {
            return Err(EngineError::SolverRejected(reply.request));
        }
        reply.request.parse::<f64>().map_err(|_| {
            EngineError::SolverRejected(format!("unparseable balance: {}", reply.request))
        })
    }

    async fn submit_recaptcha(&self, site_key: &str, page_url: &str) -> Result<String> {
        let query: Vec<(&str, Cow<'_, str>)> = vec![
            ("key", Cow::Borrowed(self.api_key.as_str())),
            ("method", Cow::Borrowed("userrecaptcha")),
            ("googlekey", Cow::Borrowed(site_key)),
            ("pageurl", Cow::Borrowed(page_url)),
            ("json", Cow::Borrowed("1")),
        ];
        let reply: ServiceReply = self
            .http
            .get_json(
                "in.php",
                RequestOpts {
                    query: Some(query),
                    ..Default::default()
                },
            )
            .await
            .map_err(http_to_engine)?;

        if reply.status != 1 {
            tracing::warn!(reason=%reply.request, "solver.submit_rejected");
            return Err(EngineError::SolverRejected(reply.request));
        }
        Ok(reply.request)
    }

    async fn poll(&self, job_id: &str) -> Result<PollOutcome> {
        let query: Vec<(&str, Cow<'_, str>)> = vec![
            ("key", Cow::Borrowed(self.api_key.as_str())),
            ("action", Cow::Borrowed("get")),
            ("id", Cow::Borrowed(job_id)),
            ("json", Cow::Borrowed("1")),
        ];
        let reply: ServiceReply = self
            .http
            .get_json(
                "res.php",
                RequestOpts {
                    // Polling has its own cadence; transport retries would
                    // only blur the ceiling.
                    retries: Some(0),
                    query: Some(query),
                    ..Default::default()
                },
            )
            .await
            .map_err(http_to_engine)?;

        if reply.status == 1 {
            return Ok(PollOutcome::Token(reply.request));
        }
        if reply.request == NOT_READY {
            return Ok(PollOutcome::NotReady);
        }
        tracing::warn!(job_id=%job_id, reason=%reply.request, "solver.rejected");
        Err(EngineError::SolverRejected(reply.request))
    }
}

fn http_to_engine(e: HttpError) -> EngineError {
    EngineError::Internal(anyhow::anyhow!("solver transport: {e}"))
}
