use crate::key::BitKey;
use aether::crypto;

/// Distills a reconciled bit string into the fixed-length session key by
/// hashing its packed bytes. The compression absorbs the parity bits leaked
/// during reconciliation.
#[inline]
pub fn amplify(key: &BitKey) -> [u8; crypto::HASH_SIZE] {
    crypto::digest(&key.to_bytes())
}
