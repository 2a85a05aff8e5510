//! Portal-facing configuration: URLs, selectors, phrase dictionaries,
//! timeouts.
//!
//! The portal's markup and wording are not a controlled dependency, so all
//! of them live here as data. An operator can ship a phrase or selector
//! update the day the portal drifts, without touching code.

use serde::Deserialize;

/// Where the certificate form lives and how long each step may take.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Deep link straight to the certificate form.
    pub form_url: String,
    /// Human navigation path walked when the deep link is redirected:
    /// home page, infractions menu, certificate service page.
    pub fallback_path: Vec<String>,
    pub selectors: PortalSelectors,
    pub phrases: PortalPhrases,
    /// Seconds to wait for an expected form control.
    pub field_timeout_secs: u64,
    /// Seconds to wait for the page to report ready after an action.
    pub settle_timeout_secs: u64,
    /// Extra quiet period after the page reports ready, in milliseconds.
    pub settle_delay_ms: u64,
    /// Longer quiet period for the full-extract page, in milliseconds.
    pub extract_settle_delay_ms: u64,
    /// Pause between menu hops on the fallback path, in milliseconds.
    pub menu_hop_delay_ms: u64,
    /// Pages below this many characters are never accepted on the id echo
    /// alone.
    pub min_result_text_len: usize,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            form_url: "https://www2.detran.rj.gov.br/portal/multas/certidao".to_string(),
            fallback_path: vec![
                "https://www.detran.rj.gov.br/".to_string(),
                "https://www.detran.rj.gov.br/menu/menu-infracoes.html".to_string(),
                "https://www.detran.rj.gov.br/infracoes/principais-servicos-infracoes/nada-consta.html"
                    .to_string(),
            ],
            selectors: PortalSelectors::default(),
            phrases: PortalPhrases::default(),
            field_timeout_secs: 30,
            settle_timeout_secs: 45,
            settle_delay_ms: 3_000,
            extract_settle_delay_ms: 5_000,
            menu_hop_delay_ms: 1_500,
            min_result_text_len: 200,
        }
    }
}

/// CSS selectors for the controls the adapter touches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalSelectors {
    pub cpf_field: String,
    pub cnh_field: String,
    /// Document-type choice, on form revisions that have one.
    pub document_type: Option<String>,
    pub submit_button: String,
    pub recaptcha_iframe: String,
    pub recaptcha_widget: String,
    pub extract_link: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            cpf_field: "#CertidaoCpf".to_string(),
            cnh_field: "#CertidaoCnh".to_string(),
            document_type: None,
            submit_button: "#btPesquisar".to_string(),
            recaptcha_iframe: "iframe[src*='recaptcha']".to_string(),
            recaptcha_widget: ".g-recaptcha".to_string(),
            extract_link: "a[href*='extrato' i]".to_string(),
        }
    }
}

/// Phrase dictionaries, all stored normalized (uppercase, accent-free).
///
/// Matching happens on [`crate::normalize_text`] output, so an operator adds
/// phrases the way they read on screen, minus the accents.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalPhrases {
    /// Any match proves the portal refused the query.
    pub rejection: Vec<String>,
    /// At least one must match for a page to count as a genuine result.
    pub presence: Vec<String>,
    /// The certificate phrase for an empty record.
    pub no_record: String,
    /// Penalty tallies; first capture group is the count.
    pub revocation_count: String,
    pub suspension_count: String,
    /// Statements that no suspension process exists.
    pub no_suspension: Vec<String>,
    /// Markers that the infraction section is populated.
    pub fines_markers: Vec<String>,
    /// Infraction tally; first capture group is the count.
    pub fines_count: String,
    /// Certificate wording that justifies a low-confidence clean fallback.
    pub generic_certificate: Vec<String>,
    /// Link text that opens the full extract page.
    pub secondary_link: String,
}

impl Default for PortalPhrases {
    fn default() -> Self {
        Self {
            rejection: vec![
                "DADOS INFORMADOS INVALIDOS".to_string(),
                "DADOS INFORMADOS NAO CONFEREM".to_string(),
                "NAO CONFEREM".to_string(),
                "CAPTCHA INCORRETO".to_string(),
                "ERRO NA CONSULTA".to_string(),
                "CODIGO DE VERIFICACAO INCORRETO".to_string(),
                "INFORME O CODIGO".to_string(),
                "PREENCHA TODOS OS CAMPOS".to_string(),
            ],
            presence: vec![
                "CERTIDAO".to_string(),
                "CERTIFICAMOS".to_string(),
                "NADA CONSTA".to_string(),
                "CONDUTOR".to_string(),
            ],
            no_record: "NADA CONSTA, NO SISTEMA DE INFRA".to_string(),
            revocation_count: r"CONDUTOR POSSUI (\d+) PENALIDADE\(S\) DE CASSACAO".to_string(),
            suspension_count: r"CONDUTOR POSSUI (\d+) PENALIDADE\(S\) DE SUSPENSAO".to_string(),
            no_suspension: vec![
                "CONDUTOR NAO POSSUI PENALIDADE DE SUSPENSAO".to_string(),
                "NENHUM REGISTRO ENCONTRADO PARA PENALIDADES DE SUSPENSAO".to_string(),
            ],
            fines_markers: vec![
                "TODAS AS INFRACOES - 5 ANOS".to_string(),
                "MULTAS (".to_string(),
            ],
            fines_count: r"QTD DE AUTOS\D*(\d+)".to_string(),
            generic_certificate: vec!["CERTIDAO".to_string(), "CERTIFICAMOS".to_string()],
            secondary_link: "CLIQUE AQUI PARA EMITIR EXTRATO COMPLETO".to_string(),
        }
    }
}

/// How many whole-transaction attempts to make and how the pauses between
/// them grow.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// The first retry waits this long; each further retry doubles it.
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 2_000,
        }
    }
}
