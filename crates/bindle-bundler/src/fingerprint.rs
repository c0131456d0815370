//! Content fingerprinting and filename-pattern substitution.

/// Short content fingerprint: the first 16 hex characters of the blake3
/// hash. Stable across builds for identical bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex()[..16].to_string()
}

/// Substitute `[name]`, `[hash]`, and `[fullhash]` tokens in a filename
/// pattern. `[fullhash]` is an accepted alias of `[hash]`.
pub fn substitute(pattern: &str, name: &str, hash: &str) -> String {
    pattern
        .replace("[name]", name)
        .replace("[fullhash]", hash)
        .replace("[hash]", hash)
}
