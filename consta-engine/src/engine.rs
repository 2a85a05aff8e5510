//! The transaction sequence: fill, solve, submit, gate, capture, classify.

use std::sync::Arc;

use async_trait::async_trait;
use consta_browser::BrowserConfig;
use consta_common::{EngineError, Result, TransactionRequest, TransactionResult};
use consta_pdf::RenderError;
use consta_solver::SolverClient;
use uuid::Uuid;

use crate::adapter::{FormField, PortalAdapter};
use crate::classify::Classifier;
use crate::config::{PortalConfig, RetryPolicy};
use crate::detran::DetranPortal;
use crate::normalize::normalize_text;
use crate::validate::validate_result_text;

/// Token-producing service, abstracted so the sequence runs in tests
/// without network access.
#[async_trait]
pub trait TokenSolver: Send + Sync {
    async fn solve(&self, site_key: &str, page_url: &str) -> Result<String>;
}

#[async_trait]
impl TokenSolver for SolverClient {
    async fn solve(&self, site_key: &str, page_url: &str) -> Result<String> {
        self.solve_recaptcha(site_key, page_url).await
    }
}

/// A secondary page must be at least this much longer than the first page's
/// text to be kept. Shorter pages are navigation bounces, not extracts.
const SECONDARY_KEEP_RATIO: f64 = 1.2;

/// Drives one certificate transaction end to end.
///
/// Construction compiles the classifier patterns; a bad pattern in
/// configuration fails here rather than mid-transaction.
pub struct TransactionEngine {
    solver: Arc<dyn TokenSolver>,
    browser: BrowserConfig,
    portal: PortalConfig,
    classifier: Classifier,
}

impl TransactionEngine {
    pub fn new(
        solver: Arc<dyn TokenSolver>,
        browser: BrowserConfig,
        portal: PortalConfig,
    ) -> Result<Self> {
        let classifier = Classifier::new(&portal.phrases)?;
        Ok(Self {
            solver,
            browser,
            portal,
            classifier,
        })
    }

    /// Run one transaction against the live portal.
    ///
    /// The browser session is closed whatever the outcome; a close failure
    /// is logged and never masks the transaction result.
    pub async fn run_transaction(&self, request: &TransactionRequest) -> Result<TransactionResult> {
        let mut portal = DetranPortal::open(&self.browser, self.portal.clone()).await?;
        let outcome = self.run_with_adapter(&mut portal, request).await;
        if let Err(e) = portal.close().await {
            tracing::warn!(target: "engine", error = %e, "browser session close failed");
        }
        outcome
    }

    /// Run the transaction with retry on transient failures.
    ///
    /// `PortalRejected` and `InvalidInput` return immediately; retrying the
    /// same identifiers cannot change the portal's answer.
    pub async fn run_with_retries(
        &self,
        policy: &RetryPolicy,
        request: &TransactionRequest,
    ) -> Result<TransactionResult> {
        crate::retry::with_policy(policy, |_attempt| self.run_transaction(request)).await
    }

    /// The transaction sequence against any [`PortalAdapter`].
    pub async fn run_with_adapter(
        &self,
        adapter: &mut dyn PortalAdapter,
        request: &TransactionRequest,
    ) -> Result<TransactionResult> {
        let case_id = Uuid::new_v4();
        tracing::info!(target: "engine", %case_id, "transaction started");

        adapter.locate_form().await?;
        tracing::debug!(target: "engine", %case_id, "form located");

        adapter
            .fill_field(FormField::NationalId, request.national_id())
            .await?;
        adapter
            .fill_field(FormField::LicenseNumber, request.license_number())
            .await?;
        adapter.fill_field(FormField::DocumentType, "cnh").await?;

        match adapter.find_challenge().await? {
            Some(challenge) => {
                let site_key_prefix: String = challenge.site_key.chars().take(8).collect();
                tracing::info!(
                    target: "engine",
                    %case_id,
                    %site_key_prefix,
                    "challenge detected"
                );
                let token = self
                    .solver
                    .solve(&challenge.site_key, &challenge.page_url)
                    .await?;
                adapter.inject_token(&token).await?;
                tracing::debug!(target: "engine", %case_id, "token injected");
            }
            // A form revision without the widget is not an error.
            None => tracing::debug!(target: "engine", %case_id, "no challenge on the form"),
        }

        adapter.submit().await?;

        let primary = adapter.capture_snapshot().await?;
        let primary_text = normalize_text(&primary.visible_text);
        validate_result_text(
            &primary_text,
            &self.portal.phrases,
            self.portal.min_result_text_len,
        )?;
        tracing::info!(
            target: "engine",
            %case_id,
            text_len = primary_text.len(),
            "result page validated"
        );

        let first_len = primary.visible_text.len();
        let mut snapshots = vec![primary];
        // The extract link is only advertised when something is on record.
        if primary_text.contains(&self.portal.phrases.secondary_link) {
            if adapter.find_secondary_link().await? {
                let secondary = adapter.capture_snapshot().await?;
                if secondary.visible_text.len() as f64 > first_len as f64 * SECONDARY_KEEP_RATIO {
                    snapshots.push(secondary);
                } else {
                    tracing::debug!(
                        target: "engine",
                        %case_id,
                        secondary_len = secondary.visible_text.len(),
                        "secondary page too short, dropped"
                    );
                }
            } else {
                tracing::warn!(
                    target: "engine",
                    %case_id,
                    "extract link advertised but not clickable"
                );
            }
        }

        let full_text = snapshots
            .iter()
            .map(|snapshot| snapshot.visible_text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let classification = self.classifier.classify(&full_text);

        let screenshots: Vec<Vec<u8>> = snapshots
            .into_iter()
            .map(|snapshot| snapshot.screenshot)
            .collect();
        let document = consta_pdf::render_document(&screenshots).map_err(render_failure)?;

        tracing::info!(
            target: "engine",
            %case_id,
            status = ?classification.status,
            pages = screenshots.len(),
            pdf_bytes = document.len(),
            "transaction complete"
        );

        Ok(TransactionResult {
            case_id,
            document,
            classification,
        })
    }
}

fn render_failure(e: RenderError) -> EngineError {
    match e {
        RenderError::NoContent => EngineError::NoContent,
        other => EngineError::Internal(anyhow::anyhow!("document rendering failed: {other}")),
    }
}
