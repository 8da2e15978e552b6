/// Parses shorthand counter text such as `"12.3K"`, `"1M"`, `"1,024 likes"`.
///
/// Digits (with an optional fractional part) may be followed by a `K`, `M` or
/// `B` suffix which multiplies by 1e3, 1e6 or 1e9; the result is floored.
/// Text without a leading number parses to 0.
pub fn parse_shorthand_count(text: &str) -> u64 {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    let int_len = compact.bytes().take_while(u8::is_ascii_digit).count();
    if int_len == 0 {
        return 0;
    }
    let int_part = &compact[..int_len];
    let rest = &compact[int_len..];

    let (frac_part, rest) = match rest.strip_prefix('.') {
        Some(after_dot) => {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            (&after_dot[..frac_len], &after_dot[frac_len..])
        }
        None => ("", rest),
    };

    let multiplier: u128 = match rest.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('K') => 1_000,
        Some('M') => 1_000_000,
        Some('B') => 1_000_000_000,
        _ => 1,
    };

    // Integer arithmetic keeps "2.3K" at exactly 2300.
    let Ok(int_value) = int_part.parse::<u128>() else {
        return u64::MAX;
    };
    let mut value = int_value.saturating_mul(multiplier);
    // Digits beyond the multiplier's precision would be floored away anyway.
    let frac_part = &frac_part[..frac_part.len().min(9)];
    if !frac_part.is_empty() {
        let frac_value: u128 = frac_part.parse().unwrap_or(0);
        let scale = 10u128.pow(frac_part.len() as u32);
        value = value.saturating_add(frac_value * multiplier / scale);
    }
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// True if `text` looks like a bare counter: digits followed only by digits,
/// separators or a magnitude suffix.
pub fn is_counter_text(text: &str) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut chars = compact.chars();
    match chars.next() {
        Some(first) if first.is_ascii_digit() => chars.all(|c| {
            c.is_ascii_digit() || matches!(c.to_ascii_uppercase(), '.' | ',' | 'K' | 'M' | 'B')
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_suffixes_scale() {
        assert_eq!(parse_shorthand_count("12.3K"), 12_300);
        assert_eq!(parse_shorthand_count("1M"), 1_000_000);
        assert_eq!(parse_shorthand_count("2.3K"), 2_300);
        assert_eq!(parse_shorthand_count("1.5B"), 1_500_000_000);
        assert_eq!(parse_shorthand_count("4.56k"), 4_560);
    }

    #[test]
    fn fractions_are_floored() {
        assert_eq!(parse_shorthand_count("1.2345K"), 1_234);
        assert_eq!(parse_shorthand_count("7.9"), 7);
    }

    #[test]
    fn separators_and_trailing_words_are_tolerated() {
        assert_eq!(parse_shorthand_count("1,024"), 1_024);
        assert_eq!(parse_shorthand_count(" 12.3K likes"), 12_300);
        assert_eq!(parse_shorthand_count("3 M"), 3_000_000);
    }

    #[test]
    fn non_numeric_text_is_zero() {
        assert_eq!(parse_shorthand_count("likes"), 0);
        assert_eq!(parse_shorthand_count(""), 0);
        assert_eq!(parse_shorthand_count("K"), 0);
        assert_eq!(parse_shorthand_count(".5K"), 0);
    }

    #[test]
    fn counter_text_detection() {
        assert!(is_counter_text("12.3K"));
        assert!(is_counter_text("1,024"));
        assert!(!is_counter_text("2 days ago"));
        assert!(!is_counter_text("Nice shot"));
        assert!(!is_counter_text(""));
    }
}
