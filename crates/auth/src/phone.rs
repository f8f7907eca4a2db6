//! Platform phone number rules and masking.

use std::sync::LazyLock;

use regex::Regex;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1[3-9]\d{9}$").expect("phone regex is valid"));
static MOBILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^1(3[4-9]|47|5[0-2]|5[7-9]|72|78|8[2-4]|8[7-8]|98)\d{8}$")
        .expect("mobile regex is valid")
});
static UNICOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^1(3[0-2]|45|5[5-6]|66|71|7[5-6]|8[5-6])\d{8}$").expect("unicom regex is valid")
});
static TELECOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^1(33|49|53|73|77|8[0-1]|89|91|99)\d{8}$").expect("telecom regex is valid")
});

/// Whether the input satisfies the platform phone rules.
///
/// Leading and trailing whitespace is tolerated; everything else is strict.
pub fn is_phone(input: &str) -> bool {
    PHONE_RE.is_match(input.trim())
}

/// Carrier classifier: China Mobile number ranges.
pub fn is_mobile_number(phone: &str) -> bool {
    MOBILE_RE.is_match(phone.trim())
}

/// Carrier classifier: China Unicom number ranges.
pub fn is_unicom_number(phone: &str) -> bool {
    UNICOM_RE.is_match(phone.trim())
}

/// Carrier classifier: China Telecom number ranges.
pub fn is_telecom_number(phone: &str) -> bool {
    TELECOM_RE.is_match(phone.trim())
}

/// Mask a phone for logging: keep the first 3 and last 4 digits.
///
/// Inputs of 4 chars or fewer are returned unchanged; between 5 and 6 chars
/// the kept head shrinks so the tail stays at 4.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let n = chars.len();
    if n <= 4 {
        return phone.to_string();
    }
    let head = if n < 7 { n - 4 } else { 3 };
    let mut masked = String::with_capacity(phone.len() + 4);
    masked.extend(&chars[..head]);
    masked.push_str("****");
    masked.extend(&chars[n - 4..]);
    masked
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_standard_numbers() {
        assert!(is_phone("13800000001"));
        assert!(is_phone(" 19912345678 "));
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(!is_phone(""));
        assert!(!is_phone("12345678901")); // second digit out of range
        assert!(!is_phone("1380000000")); // too short
        assert!(!is_phone("138000000012")); // too long
        assert!(!is_phone("1380000000a"));
    }

    #[test]
    fn classifies_carriers() {
        assert!(is_mobile_number("13412345678"));
        assert!(is_unicom_number("13012345678"));
        assert!(is_telecom_number("13312345678"));
        assert!(!is_telecom_number("13412345678"));
    }

    #[test]
    fn masks_standard_phone() {
        assert_eq!(mask_phone("13800000001"), "138****0001");
    }

    #[test]
    fn masks_short_inputs() {
        assert_eq!(mask_phone("1380"), "1380");
        assert_eq!(mask_phone("13800"), "1****3800");
        assert_eq!(mask_phone("138000"), "13****8000");
    }

    proptest! {
        #[test]
        fn mask_hides_the_middle(phone in "[0-9]{8,16}") {
            let masked = mask_phone(&phone);
            // The middle digits never survive into the masked form.
            prop_assert!(masked.contains("****"));
            prop_assert!(masked.starts_with(&phone[..3]));
            prop_assert!(masked.ends_with(&phone[phone.len() - 4..]));
            prop_assert_eq!(masked.len(), 3 + 4 + 4);
        }

        #[test]
        fn mask_never_panics(phone in "\\PC{0,24}") {
            // Phone identifiers are opaque strings; masking must hold for
            // multi-byte input too.
            let _ = mask_phone(&phone);
        }
    }
}
