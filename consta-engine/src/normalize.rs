//! Text normalization applied before any phrase matching.
//!
//! The portal renders Portuguese with inconsistent accents across pages and
//! revisions. Every dictionary phrase is stored accent-free and uppercase,
//! and all matching happens on text passed through [`normalize_text`].

/// Uppercase, fold accented vowels and cedilla to ASCII, collapse runs of
/// horizontal whitespace to one space, cap blank runs at one empty line, and
/// trim.
pub fn normalize_text(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());
    for c in input.chars() {
        let c = fold_accent(c);
        if c.is_ascii() {
            folded.push(c.to_ascii_uppercase());
        } else {
            folded.extend(c.to_uppercase());
        }
    }

    let mut out = String::with_capacity(folded.len());
    let mut pending_newlines = 0usize;
    let mut pending_space = false;
    for c in folded.chars() {
        match c {
            '\n' => {
                pending_newlines += 1;
                pending_space = false;
            }
            '\r' => {}
            c if c.is_whitespace() => pending_space = true,
            c => {
                if !out.is_empty() {
                    if pending_newlines > 0 {
                        for _ in 0..pending_newlines.min(2) {
                            out.push('\n');
                        }
                    } else if pending_space {
                        out.push(' ');
                    }
                }
                pending_newlines = 0;
                pending_space = false;
                out.push(c);
            }
        }
    }
    out
}

// The ordinal indicators map to plain letters so patterns like the
// certificate number ("Nº: 2024.123456") survive normalization.
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'ª' => 'A',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' | 'º' | '°' => 'O',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' | 'Ç' => 'C',
        _ => c,
    }
}
