//! Value maskers.
//!
//! Every function here is total: it never inspects whether its input really is
//! the class it masks, it only transforms. Classification happens in
//! [`crate::detect`] and [`crate::walker`].

const FULL_MASK: &str = "***";
const TCKN_LEN: usize = 11;

/// Keep up to two characters of the local part, star out the rest (at least
/// three stars), keep the domain.
pub fn mask_email(email: &str) -> String {
    let Some(at) = email.find('@') else {
        return FULL_MASK.to_string();
    };
    let local = &email[..at];
    let domain = &email[at + 1..];

    let local_len = local.chars().count();
    if local_len <= 1 {
        return FULL_MASK.to_string();
    }

    let keep = local_len.min(2);
    let kept: String = local.chars().take(keep).collect();
    let stars = "*".repeat((local_len - keep).max(3));
    format!("{kept}{stars}@{domain}")
}

/// `***-***-` followed by the last four digits.
pub fn mask_phone(phone: &str) -> String {
    let digits = ascii_digits(phone);
    if digits.len() < 4 {
        return FULL_MASK.to_string();
    }
    format!("***-***-{}", &digits[digits.len() - 4..])
}

/// Nine stars followed by the last two digits of an 11-digit national id.
pub fn mask_tckn(tckn: &str) -> String {
    let digits = ascii_digits(tckn);
    if digits.len() != TCKN_LEN {
        return "*".repeat(TCKN_LEN);
    }
    format!("{}{}", "*".repeat(TCKN_LEN - 2), &digits[TCKN_LEN - 2..])
}

/// Keep the first and last octet of a dotted quad.
pub fn mask_ip(ip: &str) -> String {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() != 4 {
        return "***.***.***.***".to_string();
    }
    format!("{}.***.***.{}", parts[0], parts[3])
}

/// Round a degree value to two decimals, ties away from zero.
pub fn round_location_component(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // normalize -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// String form of [`round_location_component`]. Returns `None` when the input
/// does not parse as a finite number; callers leave such values untouched.
pub fn try_round_location_str(value: &str) -> Option<String> {
    let parsed: f64 = value.trim().parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(round_location_component(parsed).to_string())
}

fn ascii_digits(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("jo@example.com"), "jo***@example.com");
        assert_eq!(mask_email("john.doe@example.com"), "jo******@example.com");
        assert_eq!(mask_email("abc@x.io"), "ab***@x.io");
    }

    #[test]
    fn test_mask_email_degenerate() {
        assert_eq!(mask_email("a@example.com"), "***");
        assert_eq!(mask_email("@example.com"), "***");
        assert_eq!(mask_email("not-an-email"), "***");
    }

    #[test]
    fn test_mask_email_multibyte_local_part() {
        assert_eq!(mask_email("çağrı@example.com"), "ça***@example.com");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+90 555 123 4567"), "***-***-4567");
        assert_eq!(mask_phone("(555) 123-4567"), "***-***-4567");
        assert_eq!(mask_phone("12"), "***");
    }

    #[test]
    fn test_mask_tckn() {
        assert_eq!(mask_tckn("10000000146"), "*********46");
        assert_eq!(mask_tckn("123"), "***********");
        assert_eq!(mask_tckn("123456789012"), "***********");
    }

    #[test]
    fn test_mask_ip() {
        assert_eq!(mask_ip("192.168.10.25"), "192.***.***.25");
        assert_eq!(mask_ip("10.0.1"), "***.***.***.***");
    }

    #[test]
    fn test_round_location() {
        assert_eq!(round_location_component(41.015137), 41.02);
        assert_eq!(round_location_component(28.979530), 28.98);
        assert_eq!(round_location_component(-12.346), -12.35);
        assert_eq!(round_location_component(-0.001), 0.0);
    }

    #[test]
    fn test_round_location_str() {
        assert_eq!(try_round_location_str("41.015137").as_deref(), Some("41.02"));
        assert_eq!(try_round_location_str(" 29 ").as_deref(), Some("29"));
        assert_eq!(try_round_location_str("north"), None);
        assert_eq!(try_round_location_str("NaN"), None);
    }
}
