//! Follow-up risk assessment for a classified certificate.
//!
//! Advisory output for whoever works the lead next: does this person need an
//! appeal specialist now, soon, or not at all. The assessment never feeds
//! back into classification.

use consta_common::{Classification, ConditionFlag, RecordStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// What the certificate outcome means for the person's license.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Whether an administrative appeal is worth pursuing.
    pub appealable: bool,
    pub guidance: String,
}

/// Assess a classified certificate, optionally refined by the driver's
/// current point balance when the caller has one.
pub fn assess(classification: &Classification, points: Option<u32>) -> RiskAssessment {
    match classification.status {
        RecordStatus::Clean => RiskAssessment {
            level: RiskLevel::Low,
            appealable: false,
            guidance: "CNH regular. Nenhuma acao necessaria.".to_string(),
        },
        RecordStatus::Unknown => RiskAssessment {
            level: RiskLevel::Low,
            appealable: false,
            guidance: "Resultado inconclusivo. Recomendada nova consulta.".to_string(),
        },
        _ => assess_restriction(classification, points),
    }
}

fn assess_restriction(classification: &Classification, points: Option<u32>) -> RiskAssessment {
    let grave = classification.flags.contains(&ConditionFlag::Suspension)
        || classification.flags.contains(&ConditionFlag::Revocation);

    let (level, guidance) = if grave {
        (
            RiskLevel::High,
            "Processo grave identificado. Recomendada analise tecnica imediata.".to_string(),
        )
    } else {
        match points {
            Some(p) if p >= 20 => (
                RiskLevel::High,
                format!("Pontuacao critica ({p} pontos). Risco iminente de suspensao."),
            ),
            Some(p) if p >= 14 => (
                RiskLevel::Medium,
                format!("Pontuacao elevada ({p} pontos). Recomendada defesa preventiva."),
            ),
            Some(_) => (
                RiskLevel::Medium,
                "Existem multas ativas. Avaliar recurso.".to_string(),
            ),
            None => (
                RiskLevel::Medium,
                "Restricao identificada. Recomendada consulta de pontuacao.".to_string(),
            ),
        }
    };

    RiskAssessment {
        level,
        appealable: true,
        guidance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn classified(status: RecordStatus, flags: &[ConditionFlag]) -> Classification {
        Classification {
            status,
            reason: "fixture".to_string(),
            person_name: None,
            document_number: None,
            flags: flags.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn clean_record_needs_nothing() {
        let assessment = assess(&classified(RecordStatus::Clean, &[]), None);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(!assessment.appealable);
    }

    #[test]
    fn suspension_process_is_high_risk() {
        let assessment = assess(
            &classified(
                RecordStatus::SuspensionRisk,
                &[ConditionFlag::Fines, ConditionFlag::Suspension],
            ),
            None,
        );
        assert_eq!(assessment.level, RiskLevel::High);
        assert!(assessment.appealable);
    }

    #[test]
    fn critical_points_escalate_fines_to_high() {
        let assessment = assess(
            &classified(RecordStatus::HasFines, &[ConditionFlag::Fines]),
            Some(22),
        );
        assert_eq!(assessment.level, RiskLevel::High);
    }

    #[test]
    fn elevated_points_stay_medium() {
        let assessment = assess(
            &classified(RecordStatus::HasFines, &[ConditionFlag::Fines]),
            Some(15),
        );
        assert_eq!(assessment.level, RiskLevel::Medium);
    }

    #[test]
    fn fines_without_points_ask_for_a_points_query() {
        let assessment = assess(
            &classified(RecordStatus::HasFines, &[ConditionFlag::Fines]),
            None,
        );
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert!(assessment.guidance.contains("pontuacao"));
    }

    #[test]
    fn unknown_outcome_is_not_appealable() {
        let assessment = assess(&Classification::unknown("sem texto"), None);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(!assessment.appealable);
    }
}
