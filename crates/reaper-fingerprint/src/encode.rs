//! Vowel-free re-encoding of checksums

/// Characters a fingerprint may contain
///
/// Vowels (and the easily confused `0`, `1`, `3`) are left out so fingerprints
/// cannot spell words when embedded in names next to arbitrary prefixes.
pub const SAFE_ALPHABET: &str = "bcdfghjklmnpqrstvwxz2456789";

/// Map every character of `s` onto [`SAFE_ALPHABET`]
///
/// ```
/// use reaper_fingerprint::safe_encode;
///
/// assert_eq!(safe_encode("0123456789"), "456789bcdf");
/// ```
pub fn safe_encode(s: &str) -> String {
    let alphabet = SAFE_ALPHABET.as_bytes();
    s.chars()
        .map(|c| char::from(alphabet[c as usize % alphabet.len()]))
        .collect()
}

/// Encode a raw checksum as a fingerprint string
pub fn encode_checksum(sum: u32) -> String {
    safe_encode(&sum.to_string())
}
