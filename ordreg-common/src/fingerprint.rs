//! Message fingerprinting for intake deduplication
//!
//! Two deliveries of the same logical message must produce the same
//! fingerprint even when whitespace or letter case differ (email clients
//! and chat platforms rewrap and re-case freely). Anything beyond
//! whitespace and case is treated as a real difference: "2x pipe" and
//! "3x pipe" are different orders.

use sha2::{Digest, Sha256};

/// Normalize message content for fingerprinting
///
/// Collapses all whitespace runs to single spaces, trims, and lowercases.
pub fn normalize_message(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Compute the deduplication fingerprint of a message
///
/// SHA-256 over the normalized content, hex encoded.
pub fn message_fingerprint(text: &str) -> String {
    let normalized = normalize_message(text);
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

/// Compute the full dedup key for a request
///
/// Identity is `(customer_id, channel, fingerprint)`; the key is a single
/// string suitable for a UNIQUE column.
pub fn dedup_key(customer_id: &str, channel: &str, text: &str) -> String {
    format!(
        "{}:{}:{}",
        customer_id.trim().to_lowercase(),
        channel.trim().to_lowercase(),
        message_fingerprint(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_message("  Need 2x   PVC\tpipe \n 2in "),
            "need 2x pvc pipe 2in"
        );
    }

    #[test]
    fn test_fingerprint_stable_under_rewrapping() {
        let a = message_fingerprint("Order: 3 pcs 8p switch, 50m 1.5mm wire");
        let b = message_fingerprint("order:   3 pcs 8p switch,\n50m 1.5mm wire");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_distinguishes_content() {
        let a = message_fingerprint("2x pvc pipe");
        let b = message_fingerprint("3x pvc pipe");
        assert_ne!(a, b);
    }

    #[test]
    fn test_dedup_key_includes_customer_and_channel() {
        let same_text = "repeat last order of 2\" pvc";
        let k1 = dedup_key("Acme Steel", "line_oa", same_text);
        let k2 = dedup_key("Bright Energy", "line_oa", same_text);
        let k3 = dedup_key("Acme Steel", "email", same_text);
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);

        // Case differences in customer id are cosmetic
        assert_eq!(k1, dedup_key("ACME STEEL", "LINE_OA", same_text));
    }
}
