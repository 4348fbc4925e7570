//! CNPJ (Brazilian company tax ID) check-digit validation.
//!
//! Pure functions, no I/O. Callers validate before any registry request.

/// Strips every non-digit character (`11.222.333/0001-81` -> `11222333000181`).
pub fn clean(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn check_digit(digits: &[u32], start_weight: u32) -> u32 {
    let mut sum = 0;
    let mut weight = start_weight;
    for d in digits {
        sum += d * weight;
        weight = if weight == 2 { 9 } else { weight - 1 };
    }
    let rest = sum % 11;
    if rest < 2 {
        0
    } else {
        11 - rest
    }
}

/// Validates a 14-digit CNPJ string (digits only).
pub fn validate(tax_id: &str) -> bool {
    if tax_id.len() != 14 || !tax_id.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = tax_id.bytes().map(|b| u32::from(b - b'0')).collect();

    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    if check_digit(&digits[..12], 5) != digits[12] {
        return false;
    }

    check_digit(&digits[..13], 6) == digits[13]
}

/// Formats a clean 14-digit CNPJ as `XX.XXX.XXX/XXXX-XX`; anything else is returned as-is.
pub fn format(tax_id: &str) -> String {
    if tax_id.len() != 14 || !tax_id.bytes().all(|b| b.is_ascii_digit()) {
        return tax_id.to_string();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &tax_id[0..2],
        &tax_id[2..5],
        &tax_id[5..8],
        &tax_id[8..12],
        &tax_id[12..14]
    )
}
