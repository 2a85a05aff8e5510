//! Subcommand implementations for the `consta` binary.
//!
//! Every command prints a JSON document to stdout so the binary composes
//! with shell pipelines; human-oriented output goes to the log.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use consta_common::{RecordStatus, TransactionRequest};
use consta_config::ConstaConfig;
use consta_engine::TransactionEngine;
use consta_leads::{parse_document_text, LeadObservation, LeadRegistry, LeadSource};
use consta_solver::SolverClient;
use serde_json::json;

#[derive(Subcommand)]
pub enum LeadsCommand {
    /// All known leads, most recently seen first.
    List,
    /// Aggregate counts by status and source.
    Stats,
    /// Record one manual observation.
    Observe {
        #[arg(long)]
        cpf: String,
        #[arg(long)]
        cnh: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum, default_value_t = SourceArg::Manual)]
        source: SourceArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceArg {
    Manual,
    Upload,
    Camera,
}

impl From<SourceArg> for LeadSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Manual => LeadSource::Manual,
            SourceArg::Upload => LeadSource::Upload,
            SourceArg::Camera => LeadSource::Camera,
        }
    }
}

pub async fn run_certificate(
    config: &ConstaConfig,
    cpf: &str,
    cnh: &str,
    out: Option<PathBuf>,
    retry: bool,
    points: Option<u32>,
) -> Result<()> {
    let request = TransactionRequest::new(cpf, cnh)?;
    let registry = LeadRegistry::open(&config.leads).await?;

    let solver = SolverClient::new(&config.solver)?;
    let engine = TransactionEngine::new(
        Arc::new(solver),
        config.browser.clone(),
        config.portal.clone(),
    )?;

    let outcome = if retry {
        engine.run_with_retries(&config.retry, &request).await
    } else {
        engine.run_transaction(&request).await
    };

    // The attempt itself is a lead, whatever its outcome.
    let observation = match &outcome {
        Ok(result) => LeadObservation {
            national_id: request.national_id().to_string(),
            license_number: Some(request.license_number().to_string()),
            name: result.classification.person_name.clone(),
            source: LeadSource::Manual,
            status: Some(result.classification.status),
            reason: Some(result.classification.reason.clone()),
        },
        Err(e) => LeadObservation {
            national_id: request.national_id().to_string(),
            license_number: Some(request.license_number().to_string()),
            name: None,
            source: LeadSource::Manual,
            status: Some(RecordStatus::Unknown),
            reason: Some(e.to_string()),
        },
    };
    if let Err(e) = registry.observe(observation).await {
        tracing::warn!(target: "app", error = %e, "lead observation failed");
    }

    let result = outcome?;

    let path = out.unwrap_or_else(|| PathBuf::from(format!("certidao-{}.pdf", result.case_id)));
    tokio::fs::write(&path, &result.document)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    let summary = json!({
        "case_id": result.case_id,
        "document": path,
        "pages": consta_pdf::page_count(&result.document)?,
        "classification": result.classification,
        "risk": consta_leads::assess(&result.classification, points),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub async fn run_balance(config: &ConstaConfig) -> Result<()> {
    let solver = SolverClient::new(&config.solver)?;
    let balance = solver.balance().await?;
    println!("{}", serde_json::to_string_pretty(&json!({ "balance": balance }))?);
    Ok(())
}

pub async fn run_leads(config: &ConstaConfig, command: LeadsCommand) -> Result<()> {
    let registry = LeadRegistry::open(&config.leads).await?;
    match command {
        LeadsCommand::List => {
            let leads = registry.list().await;
            println!("{}", serde_json::to_string_pretty(&leads)?);
        }
        LeadsCommand::Stats => {
            let stats = registry.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        LeadsCommand::Observe {
            cpf,
            cnh,
            name,
            source,
        } => {
            let record = registry
                .observe(LeadObservation {
                    national_id: cpf,
                    license_number: cnh,
                    name,
                    source: source.into(),
                    status: None,
                    reason: None,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    Ok(())
}

pub async fn run_parse_intake(
    config: &ConstaConfig,
    file: Option<PathBuf>,
    observe: bool,
    source: SourceArg,
) -> Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            use tokio::io::AsyncReadExt;
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("reading stdin")?;
            buf
        }
    };

    let parsed = parse_document_text(&text);
    println!("{}", serde_json::to_string_pretty(&parsed)?);

    if observe {
        match &parsed.national_id {
            Some(national_id) => {
                let registry = LeadRegistry::open(&config.leads).await?;
                registry
                    .observe(LeadObservation {
                        national_id: national_id.clone(),
                        license_number: parsed.license_number.clone(),
                        name: parsed.name.clone(),
                        source: source.into(),
                        status: None,
                        reason: None,
                    })
                    .await?;
            }
            // A parse without a CPF is still useful output, just not a lead.
            None => tracing::warn!(target: "app", "no CPF in parsed text, lead not recorded"),
        }
    }
    Ok(())
}
