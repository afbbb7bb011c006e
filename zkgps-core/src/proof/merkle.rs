//! Merkle roots over string leaves.

use crate::crypto::HashProvider;

/// Computes the Merkle root of `leaves` as hex.
///
/// Leaves are sorted first so the root is independent of input order.
/// Each leaf is hashed, then adjacent hex digests are concatenated and
/// hashed level by level, duplicating the last digest on odd levels. An
/// empty input yields the digest of the empty string.
///
/// # Example
///
/// ```
/// use zkgps_core::crypto::{HashProvider, Sha256Hasher};
/// use zkgps_core::proof::merkle_root;
///
/// let a = merkle_root(["b", "a"], &Sha256Hasher);
/// let b = merkle_root(["a", "b"], &Sha256Hasher);
/// assert_eq!(a, b);
/// assert_eq!(merkle_root(Vec::<String>::new(), &Sha256Hasher), Sha256Hasher.hash_hex(""));
/// ```
pub fn merkle_root<I, S>(leaves: I, hasher: &dyn HashProvider) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<String> = leaves.into_iter().map(|s| s.as_ref().to_string()).collect();
    if sorted.is_empty() {
        return hasher.hash_hex("");
    }
    sorted.sort_unstable();

    let mut level: Vec<String> = sorted.iter().map(|leaf| hasher.hash_hex(leaf)).collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let right = pair.get(1).unwrap_or(&pair[0]);
                hasher.hash_hex(&format!("{}{right}", pair[0]))
            })
            .collect();
    }
    level.swap_remove(0)
}
