//! Numeric literal parsing shared by the tokenizer, the symbol database and
//! value flow.

/// The integer type all abstract values are computed in.
pub type Bigint = i128;

/// True if `text` is an integer literal (decimal, hex, octal or binary,
/// with optional integer suffix).
pub fn is_int(text: &str) -> bool {
    to_bigint(text).is_some()
}

/// True if `text` is a floating point literal.
pub fn is_float(text: &str) -> bool {
    let body = text
        .trim_end_matches(|c| matches!(c, 'f' | 'F' | 'l' | 'L'))
        .replace('\'', "");
    if !body.contains('.') && !body.contains(['e', 'E']) {
        return false;
    }
    !body.is_empty() && body.parse::<f64>().is_ok()
}

/// Parse an integer literal. Returns `None` for anything else.
pub fn to_bigint(text: &str) -> Option<Bigint> {
    let text = text.replace('\'', "");
    let mut body = text.as_str();
    // MSVC style i64 suffix, then the standard u/l suffixes
    for suffix in ["i64", "I64", "i32", "I32"] {
        if let Some(stripped) = body.strip_suffix(suffix) {
            body = stripped;
            break;
        }
    }
    body = body.trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    if body.is_empty() {
        return None;
    }
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        return Bigint::from_str_radix(hex, 16).ok();
    }
    if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        return Bigint::from_str_radix(bin, 2).ok();
    }
    if body.len() > 1 && body.starts_with('0') && body.bytes().all(|b| b.is_ascii_digit()) {
        return Bigint::from_str_radix(&body[1..], 8).ok();
    }
    if body.bytes().all(|b| b.is_ascii_digit()) {
        return body.parse().ok();
    }
    None
}

/// Parse a floating point literal.
pub fn to_double(text: &str) -> Option<f64> {
    if let Some(value) = to_bigint(text) {
        return Some(value as f64);
    }
    let body = text
        .trim_end_matches(|c| matches!(c, 'f' | 'F' | 'l' | 'L'))
        .replace('\'', "");
    body.parse().ok()
}

/// True for an unsigned integer suffix (`u`, `ul`, `ull`, ...).
pub fn has_unsigned_suffix(text: &str) -> bool {
    text.bytes()
        .rev()
        .take_while(|b| matches!(b, b'u' | b'U' | b'l' | b'L'))
        .any(|b| matches!(b, b'u' | b'U'))
}

/// Number of `l` suffix characters, to size the literal (0, 1 or 2).
pub fn long_suffix_count(text: &str) -> u32 {
    text.bytes()
        .rev()
        .take_while(|b| matches!(b, b'u' | b'U' | b'l' | b'L'))
        .filter(|b| matches!(b, b'l' | b'L'))
        .count() as u32
}

/// Character value of a char literal body (without quotes), if simple.
pub fn char_literal_value(body: &str) -> Option<Bigint> {
    let mut chars = body.chars();
    match chars.next()? {
        '\\' => {
            let escaped = chars.next()?;
            if chars.next().is_some() && !matches!(escaped, 'x' | '0'..='7') {
                return None;
            }
            Some(match escaped {
                'n' => 10,
                't' => 9,
                'r' => 13,
                '0' => 0,
                '\\' => 92,
                '\'' => 39,
                '"' => 34,
                'a' => 7,
                'b' => 8,
                'f' => 12,
                'v' => 11,
                _ => return None,
            })
        }
        c => {
            if chars.next().is_some() {
                return None;
            }
            Some(c as Bigint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(to_bigint("0"), Some(0));
        assert_eq!(to_bigint("123"), Some(123));
        assert_eq!(to_bigint("0x10"), Some(16));
        assert_eq!(to_bigint("010"), Some(8));
        assert_eq!(to_bigint("0b101"), Some(5));
        assert_eq!(to_bigint("42u"), Some(42));
        assert_eq!(to_bigint("42ULL"), Some(42));
        assert_eq!(to_bigint("1i64"), Some(1));
        assert_eq!(to_bigint("3.5"), None);
        assert_eq!(to_bigint("x"), None);
    }

    #[test]
    fn floats() {
        assert!(is_float("1.5"));
        assert!(is_float("1e10"));
        assert!(is_float("2.5f"));
        assert!(!is_float("15"));
        assert_eq!(to_double("2.5f"), Some(2.5));
        assert_eq!(to_double("3"), Some(3.0));
    }

    #[test]
    fn suffixes() {
        assert!(has_unsigned_suffix("1u"));
        assert!(has_unsigned_suffix("1UL"));
        assert!(!has_unsigned_suffix("1l"));
        assert_eq!(long_suffix_count("1"), 0);
        assert_eq!(long_suffix_count("1l"), 1);
        assert_eq!(long_suffix_count("1ull"), 2);
    }

    #[test]
    fn char_literals() {
        assert_eq!(char_literal_value("a"), Some(97));
        assert_eq!(char_literal_value("\\n"), Some(10));
        assert_eq!(char_literal_value("\\0"), Some(0));
        assert_eq!(char_literal_value("ab"), None);
    }
}
