use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Stable identity of a level's source text. Persisted memory is only valid for the
/// exact level it was recorded against, since hackables are keyed by document order.
pub fn level_fingerprint(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    to_hex_lower(&hasher.finalize())
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_lowercase_sha256_hex() {
        assert_eq!(
            level_fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fingerprint_changes_with_content() {
        assert_ne!(
            level_fingerprint("<Level name=\"a\"/>"),
            level_fingerprint("<Level name=\"b\"/>")
        );
    }
}
