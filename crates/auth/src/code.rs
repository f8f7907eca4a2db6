//! One-time code generation and message rendering.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::TryRngCore;
use rand::rngs::OsRng;

/// Number of digits in a one-time code.
pub const CODE_LENGTH: usize = 6;

const FALLBACK_MOD: u64 = 1_000_000;

/// Generate a random numeric code from the OS entropy source.
///
/// Falls back to timestamp-derived digits when the entropy source errs,
/// trading uniform distribution for availability.
pub fn generate_code() -> String {
    let mut buf = [0u8; CODE_LENGTH];
    if OsRng.try_fill_bytes(&mut buf).is_err() {
        tracing::error!("os entropy source failed, using timestamp fallback code");
        return fallback_code();
    }
    buf.iter().map(|b| char::from(b'0' + b % 10)).collect()
}

/// Timestamp-derived code, used only when the entropy source fails.
fn fallback_code() -> String {
    format_digits(now_unix_ns())
}

/// Format a number as a fixed-width code, keeping leading zeros.
fn format_digits(num: u64) -> String {
    format!("{:0width$}", num % FALLBACK_MOD, width = CODE_LENGTH)
}

fn now_unix_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Render the outbound message from the configured template.
///
/// The template carries a single `{code}` placeholder; an empty template
/// uses the default wording.
pub fn render_content(template: &str, code: &str) -> String {
    if template.is_empty() {
        return format!("Your verification code is {code}. Use it before it expires.");
    }
    template.replace("{code}", code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_code_is_six_digits() {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn fallback_code_is_six_digits() {
        let code = fallback_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn format_digits_keeps_leading_zeros() {
        assert_eq!(format_digits(7), "000007");
        assert_eq!(format_digits(0), "000000");
        assert_eq!(format_digits(123_456), "123456");
    }

    #[test]
    fn render_uses_default_wording_when_template_empty() {
        let content = render_content("", "042042");
        assert!(content.contains("042042"));
    }

    #[test]
    fn render_substitutes_placeholder() {
        assert_eq!(
            render_content("lastmile code: {code}, valid 5 minutes", "000123"),
            "lastmile code: 000123, valid 5 minutes"
        );
    }

    proptest! {
        #[test]
        fn format_digits_always_fixed_width(num in any::<u64>()) {
            let code = format_digits(num);
            prop_assert_eq!(code.len(), CODE_LENGTH);
            prop_assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }

        #[test]
        fn rendered_content_always_carries_the_code(code in "[0-9]{6}") {
            prop_assert!(render_content("", &code).contains(&code));
            let rendered = render_content("code {code} here", &code);
            prop_assert!(rendered.contains(&code));
        }
    }
}
