//! Secret masking for safe logging.
//!
//! Bot tokens and webhook secrets routinely end up in log lines (failed
//! auth attempts, outbound call diagnostics). Everything logged goes
//! through the two-character reveal policy here: long enough secrets show
//! their first and last two characters, everything else collapses to a
//! fixed placeholder.

/// Fixed reveal policy applied to sensitive strings before logging.
///
/// Secrets shorter than `threshold` characters are replaced entirely by
/// `placeholder`; longer secrets keep `reveal_prefix` leading and
/// `reveal_suffix` trailing characters with the interior starred out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactionPolicy {
    /// Minimum length (inclusive) for a partial reveal.
    pub threshold: usize,
    /// Characters shown from the start of the secret.
    pub reveal_prefix: usize,
    /// Characters shown from the end of the secret.
    pub reveal_suffix: usize,
    /// Returned verbatim for secrets below the threshold.
    pub placeholder: &'static str,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            threshold: 6,
            reveal_prefix: 2,
            reveal_suffix: 2,
            placeholder: "***",
        }
    }
}

impl RedactionPolicy {
    /// Produce the display form of `secret` under this policy.
    ///
    /// Counts characters, not bytes, so multi-byte input cannot split a
    /// codepoint. Interior characters are never disclosed.
    pub fn mask(&self, secret: &str) -> String {
        let chars: Vec<char> = secret.chars().collect();

        // Below the reveal threshold there is not enough material to
        // safely show anything at all.
        if chars.len() < self.threshold || chars.len() < self.reveal_prefix + self.reveal_suffix {
            return self.placeholder.to_string();
        }

        let prefix: String = chars[..self.reveal_prefix].iter().collect();
        let suffix: String = chars[chars.len() - self.reveal_suffix..].iter().collect();
        let mask_len = chars.len() - self.reveal_prefix - self.reveal_suffix;

        format!("{}{}{}", prefix, "*".repeat(mask_len), suffix)
    }
}

/// Mask `secret` under the default two-character reveal policy.
pub fn mask_secret(secret: &str) -> String {
    RedactionPolicy::default().mask(secret)
}

/// Mask an optional secret; absent values map to the placeholder.
pub fn mask_optional(secret: Option<&str>) -> String {
    match secret {
        Some(value) => mask_secret(value),
        None => RedactionPolicy::default().placeholder.to_string(),
    }
}
