//! Best-effort field extraction from OCR'd license text.
//!
//! OCR output is noisy and the layout varies by CNH print batch, so every
//! field here is optional and the parse carries a confidence score instead of
//! failing. A parse without a usable id is still returned; what to do with it
//! is the caller's decision.

use consta_common::normalize_digits;
use regex::Regex;
use serde::Serialize;

/// Fields recovered from one OCR pass, each best-effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedDocument {
    pub national_id: Option<String>,
    pub license_number: Option<String>,
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub category: Option<String>,
    pub expires_at: Option<String>,
    /// 0-100, driven by which ids were found and whether the CPF checks out.
    pub confidence: u8,
}

/// Pull structured fields out of raw OCR text.
pub fn parse_document_text(text: &str) -> ParsedDocument {
    let national_id = capture(r"(\d{3}\.?\d{3}\.?\d{3}-?\d{2})", text)
        .map(|m| normalize_digits(&m))
        .filter(|digits| digits.len() == 11);

    // The plausible 9-12 digit range is enforced by the patterns themselves.
    let license_number = first_capture(
        &[
            r"(?i)CNH[:\s]*(\d{9,12})",
            r"(?i)(?:REGISTRO|N[UÚ]MERO)[:\s]*(\d{9,12})",
            r"(?i)(\d{9,12})\s*(?:CNH|REGISTRO)",
        ],
        text,
    );

    let name = capture(
        r"(?i)NOME[:\s]*([A-ZÁÀÂÃÉÊÍÓÔÕÚÇ][A-ZÁÀÂÃÉÊÍÓÔÕÚÇa-záàâãéêíóôõúç ]+)",
        text,
    )
    .map(|m| m.trim().to_string());

    let birth_date = capture(r"(\d{2}[/-]\d{2}[/-]\d{4})", text);
    let category = capture(r"(?i)CATEGORIA[:\s]*([A-E]{1,2})", text);
    let expires_at = first_capture(
        &[
            r"(?i)V[AÁ]LIDA\s+AT[EÉ][:\s]*(\d{2}[/-]\d{2}[/-]\d{4})",
            r"(?i)VENCIMENTO[:\s]*(\d{2}[/-]\d{2}[/-]\d{4})",
        ],
        text,
    );

    let confidence = score(national_id.as_deref(), license_number.as_deref());

    ParsedDocument {
        national_id,
        license_number,
        name,
        birth_date,
        category,
        expires_at,
        confidence,
    }
}

/// Validate a CPF's two mod-11 check digits.
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits = normalize_digits(cpf);
    if digits.len() != 11 {
        return false;
    }
    let nums: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    // Sequences like 111.111.111-11 satisfy the arithmetic but are never
    // issued.
    if nums.windows(2).all(|w| w[0] == w[1]) {
        return false;
    }
    check_digit(&nums, 9) == nums[9] && check_digit(&nums, 10) == nums[10]
}

fn check_digit(nums: &[u32], position: usize) -> u32 {
    let sum: u32 = nums[..position]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (position as u32 + 1 - i as u32))
        .sum();
    match sum % 11 {
        rest if rest < 2 => 0,
        rest => 11 - rest,
    }
}

fn score(cpf: Option<&str>, cnh: Option<&str>) -> u8 {
    let mut confidence = 0u8;
    if let Some(cpf) = cpf {
        confidence += if is_valid_cpf(cpf) { 40 } else { 20 };
    }
    if cnh.is_some() {
        confidence += 40;
    }
    confidence.min(100)
}

fn capture(pattern: &str, text: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

fn first_capture(patterns: &[&str], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| capture(pattern, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "CARTEIRA NACIONAL DE HABILITACAO\n\
        Nome: JOSE CARLOS PEREIRA\n\
        CPF: 529.982.247-25\n\
        Registro: 01234567890\n\
        Nascimento: 12/03/1985\n\
        Categoria: AB\n\
        Valida ate: 20/10/2027";

    #[test]
    fn parses_a_full_license() {
        let parsed = parse_document_text(SAMPLE);

        assert_eq!(parsed.national_id.as_deref(), Some("52998224725"));
        assert_eq!(parsed.license_number.as_deref(), Some("01234567890"));
        assert_eq!(parsed.name.as_deref(), Some("JOSE CARLOS PEREIRA"));
        assert_eq!(parsed.birth_date.as_deref(), Some("12/03/1985"));
        assert_eq!(parsed.category.as_deref(), Some("AB"));
        assert_eq!(parsed.expires_at.as_deref(), Some("20/10/2027"));
        assert_eq!(parsed.confidence, 80);
    }

    #[test]
    fn invalid_cpf_still_extracts_with_less_confidence() {
        let parsed = parse_document_text("CPF: 123.456.789-00\nCNH: 987654321");

        assert_eq!(parsed.national_id.as_deref(), Some("12345678900"));
        assert_eq!(parsed.license_number.as_deref(), Some("987654321"));
        assert_eq!(parsed.confidence, 60);
    }

    #[test]
    fn empty_text_yields_an_empty_parse() {
        assert_eq!(parse_document_text(""), ParsedDocument::default());
    }

    #[test]
    fn registro_label_finds_the_license_number() {
        let parsed = parse_document_text("N do Registro: 98765432100");
        assert_eq!(parsed.license_number.as_deref(), Some("98765432100"));
    }

    #[test]
    fn cpf_check_digits() {
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(is_valid_cpf("52998224725"));
        assert!(!is_valid_cpf("529.982.247-24"));
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("1234567890"));
    }
}
