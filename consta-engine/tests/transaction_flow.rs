//! The full transaction sequence against a scripted portal.
//!
//! Every test drives [`TransactionEngine::run_with_adapter`] through a
//! [`PortalAdapter`] that serves canned pages, so the sequence, the result
//! gate, the classifier, and the renderer are exercised together without a
//! browser or the solving service.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use consta_browser::BrowserConfig;
use consta_common::{
    ConditionFlag, EngineError, PageSnapshot, RecordStatus, Result, TransactionRequest,
};
use consta_engine::{
    CaptchaChallenge, FormField, PortalAdapter, PortalConfig, TokenSolver, TransactionEngine,
};
use consta_solver::{SolverClient, SolverConfig};
use pretty_assertions::assert_eq;

const CLEAN_PAGE_TEXT: &str = "GOVERNO DO ESTADO DO RIO DE JANEIRO\n\
    DETRAN-RJ\n\
    CERTIDAO DE NADA CONSTA\n\
    Nº: 2024.123456\n\
    CERTIFICAMOS QUE, PESQUISANDO O PRONTUARIO CONTRA: JOSE CARLOS PEREIRA, \
    VINCULADO AO CPF Nº: 529.982.247-25, NADA CONSTA, NO SISTEMA DE INFRACOES \
    DO DETRAN-RJ ATE A PRESENTE DATA.";

fn restricted_page_with_link() -> String {
    "CERTIDAO DE PRONTUARIO\n\
     CONDUTOR POSSUI 1 PENALIDADE(S) DE SUSPENSAO\n\
     CLIQUE AQUI PARA EMITIR EXTRATO COMPLETO"
        .to_string()
}

fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer
            .write_image_data(&vec![200u8; (width * height * 3) as usize])
            .unwrap();
    }
    out
}

fn page(text: &str, width: u32, height: u32) -> PageSnapshot {
    PageSnapshot {
        visible_text: text.to_string(),
        screenshot: tiny_png(width, height),
    }
}

#[derive(Default)]
struct CannedSolver {
    calls: AtomicU32,
}

#[async_trait]
impl TokenSolver for CannedSolver {
    async fn solve(&self, _site_key: &str, _page_url: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("tok-{n}"))
    }
}

struct FailingSolver;

#[async_trait]
impl TokenSolver for FailingSolver {
    async fn solve(&self, _site_key: &str, _page_url: &str) -> Result<String> {
        Err(EngineError::SolverTimeout(120))
    }
}

/// Serves canned snapshots in capture order and records what the engine
/// did to the form.
struct ScriptedPortal {
    challenge: Option<CaptchaChallenge>,
    pages: Vec<PageSnapshot>,
    secondary_clickable: bool,
    captures: usize,
    filled: Vec<(FormField, String)>,
    injected_tokens: Vec<String>,
    submitted: bool,
}

impl ScriptedPortal {
    fn new(pages: Vec<PageSnapshot>) -> Self {
        Self {
            challenge: Some(CaptchaChallenge {
                site_key: "6LdXhv4UAAAAAN3ZW0d2eqmCL8W5pJ4roQdBnQXk".to_string(),
                page_url: "https://www2.detran.rj.gov.br/portal/multas/certidao".to_string(),
            }),
            pages,
            secondary_clickable: true,
            captures: 0,
            filled: Vec::new(),
            injected_tokens: Vec::new(),
            submitted: false,
        }
    }
}

#[async_trait]
impl PortalAdapter for ScriptedPortal {
    async fn locate_form(&mut self) -> Result<()> {
        Ok(())
    }

    async fn fill_field(&mut self, field: FormField, value: &str) -> Result<()> {
        self.filled.push((field, value.to_string()));
        Ok(())
    }

    async fn find_challenge(&mut self) -> Result<Option<CaptchaChallenge>> {
        Ok(self.challenge.clone())
    }

    async fn inject_token(&mut self, token: &str) -> Result<()> {
        self.injected_tokens.push(token.to_string());
        Ok(())
    }

    async fn submit(&mut self) -> Result<()> {
        self.submitted = true;
        Ok(())
    }

    async fn capture_snapshot(&mut self) -> Result<PageSnapshot> {
        let snapshot = self
            .pages
            .get(self.captures)
            .cloned()
            .ok_or_else(|| EngineError::Internal(anyhow::anyhow!("no scripted page left")))?;
        self.captures += 1;
        Ok(snapshot)
    }

    async fn find_secondary_link(&mut self) -> Result<bool> {
        Ok(self.secondary_clickable)
    }
}

fn engine(solver: Arc<dyn TokenSolver>) -> TransactionEngine {
    TransactionEngine::new(solver, BrowserConfig::default(), PortalConfig::default()).unwrap()
}

fn request() -> TransactionRequest {
    TransactionRequest::new("529.982.247-25", "01234567890").unwrap()
}

#[tokio::test]
async fn clean_record_produces_a_one_page_clean_result() {
    let solver = Arc::new(CannedSolver::default());
    let engine = engine(solver.clone());
    let mut portal = ScriptedPortal::new(vec![page(CLEAN_PAGE_TEXT, 60, 80)]);

    let result = engine
        .run_with_adapter(&mut portal, &request())
        .await
        .unwrap();

    assert_eq!(result.classification.status, RecordStatus::Clean);
    assert!(result.classification.flags.is_empty());
    assert_eq!(consta_pdf::page_count(&result.document).unwrap(), 1);
    assert_eq!(solver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(portal.injected_tokens, vec!["tok-1"]);
    assert!(portal.submitted);
    assert!(portal
        .filled
        .contains(&(FormField::NationalId, "52998224725".to_string())));
    assert!(portal
        .filled
        .contains(&(FormField::LicenseNumber, "01234567890".to_string())));
}

#[tokio::test]
async fn rejection_page_fails_without_reaching_the_extract() {
    let engine = engine(Arc::new(CannedSolver::default()));
    let mut portal = ScriptedPortal::new(vec![page(
        "DADOS INFORMADOS NÃO CONFEREM. Verifique o CPF e a CNH digitados.",
        60,
        80,
    )]);

    let err = engine
        .run_with_adapter(&mut portal, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::PortalRejected(_)));
    assert_eq!(portal.captures, 1);
}

#[tokio::test]
async fn unrecognized_page_is_never_reported_clean() {
    let engine = engine(Arc::new(CannedSolver::default()));
    let mut portal =
        ScriptedPortal::new(vec![page("SISTEMA TEMPORARIAMENTE INDISPONIVEL", 60, 80)]);

    let err = engine
        .run_with_adapter(&mut portal, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::PortalRejected(_)));
}

#[tokio::test]
async fn missing_widget_skips_the_solver() {
    let solver = Arc::new(CannedSolver::default());
    let engine = engine(solver.clone());
    let mut portal = ScriptedPortal::new(vec![page(CLEAN_PAGE_TEXT, 60, 80)]);
    portal.challenge = None;

    let result = engine
        .run_with_adapter(&mut portal, &request())
        .await
        .unwrap();

    assert_eq!(result.classification.status, RecordStatus::Clean);
    assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    assert!(portal.injected_tokens.is_empty());
}

#[tokio::test]
async fn solver_failure_stops_before_submission() {
    let engine = engine(Arc::new(FailingSolver));
    let mut portal = ScriptedPortal::new(vec![page(CLEAN_PAGE_TEXT, 60, 80)]);

    let err = engine
        .run_with_adapter(&mut portal, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::SolverTimeout(_)));
    assert!(!portal.submitted);
    assert_eq!(portal.captures, 0);
}

#[tokio::test]
async fn extract_link_adds_a_second_page() {
    let engine = engine(Arc::new(CannedSolver::default()));
    let extract = format!(
        "EXTRATO COMPLETO DO PRONTUARIO\n{}",
        "AUTO DE INFRACAO 123 MULTA GRAVE\n".repeat(20)
    );
    let mut portal = ScriptedPortal::new(vec![
        page(&restricted_page_with_link(), 60, 80),
        page(&extract, 60, 200),
    ]);

    let result = engine
        .run_with_adapter(&mut portal, &request())
        .await
        .unwrap();

    assert_eq!(result.classification.status, RecordStatus::SuspensionRisk);
    assert!(result
        .classification
        .flags
        .contains(&ConditionFlag::Suspension));
    assert_eq!(consta_pdf::page_count(&result.document).unwrap(), 2);
    assert_eq!(
        consta_pdf::page_dimensions(&result.document).unwrap(),
        vec![(60, 80), (60, 200)]
    );
}

#[tokio::test]
async fn short_extract_page_is_dropped() {
    let engine = engine(Arc::new(CannedSolver::default()));
    let mut portal = ScriptedPortal::new(vec![
        page(&restricted_page_with_link(), 60, 80),
        page("VOLTAR", 60, 40),
    ]);

    let result = engine
        .run_with_adapter(&mut portal, &request())
        .await
        .unwrap();

    assert_eq!(result.classification.status, RecordStatus::SuspensionRisk);
    assert_eq!(consta_pdf::page_count(&result.document).unwrap(), 1);
    assert_eq!(portal.captures, 2);
}

#[tokio::test]
async fn unclickable_extract_link_still_returns_the_first_page() {
    let engine = engine(Arc::new(CannedSolver::default()));
    let mut portal = ScriptedPortal::new(vec![page(&restricted_page_with_link(), 60, 80)]);
    portal.secondary_clickable = false;

    let result = engine
        .run_with_adapter(&mut portal, &request())
        .await
        .unwrap();

    assert_eq!(consta_pdf::page_count(&result.document).unwrap(), 1);
    assert_eq!(portal.captures, 1);
}

/// End-to-end run against the live portal. Needs a running chromedriver,
/// a funded solver account, and real identifiers:
///
/// `CONSTA_E2E_API_KEY=... CONSTA_E2E_CPF=... CONSTA_E2E_CNH=... \
///  cargo test -p consta-engine -- --ignored live_portal_smoke`
#[tokio::test]
#[ignore]
async fn live_portal_smoke() {
    let api_key = match std::env::var("CONSTA_E2E_API_KEY") {
        Ok(key) => key,
        Err(_) => return,
    };
    let cpf = std::env::var("CONSTA_E2E_CPF").unwrap_or_default();
    let cnh = std::env::var("CONSTA_E2E_CNH").unwrap_or_default();
    let request = match TransactionRequest::new(&cpf, &cnh) {
        Ok(request) => request,
        Err(_) => return,
    };

    let solver = SolverClient::new(&SolverConfig {
        api_key,
        ..SolverConfig::default()
    })
    .unwrap();
    let engine = TransactionEngine::new(
        Arc::new(solver),
        BrowserConfig::default(),
        PortalConfig::default(),
    )
    .unwrap();

    let result = engine.run_transaction(&request).await.unwrap();
    assert!(consta_pdf::page_count(&result.document).unwrap() >= 1);
}
