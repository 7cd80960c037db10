use aes_gcm::aead::generic_array::typenum::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aes::Aes256;
use aes_gcm::{AeadInPlace, AesGcm, KeyInit};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 16;
pub const TAG_SIZE: usize = 16;
pub const HASH_SIZE: usize = 32;

/// Overhead added by `seal` on top of the plaintext length.
pub const SEAL_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

// AES-256-GCM with the extended 16 byte nonce carried on the wire.
type Aead = AesGcm<Aes256, U16>;

/// Encrypts the plaintext under the supplied key with a fresh random nonce.
/// The sealed message is laid out as `nonce ‖ tag ‖ ciphertext` and is
/// exactly `SEAL_OVERHEAD` bytes longer than the plaintext.
pub fn seal(plain: &[u8], key: &[u8; KEY_SIZE]) -> Option<Vec<u8>> {
    let cipher = Aead::new(GenericArray::from_slice(key));

    let mut nonce = [0u8; NONCE_SIZE];
    random_bytes(&mut nonce);

    let mut body = plain.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce), &[], &mut body)
        .ok()?;

    let mut sealed = Vec::with_capacity(SEAL_OVERHEAD + body.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&tag);
    sealed.extend_from_slice(&body);

    Some(sealed)
}

/// Decrypts a message produced by `seal`. Returns `None` when the message is
/// too short to carry the nonce and tag, or when tag verification fails
/// (wrong key or tampered payload). No plaintext escapes on failure.
pub fn open(sealed: &[u8], key: &[u8; KEY_SIZE]) -> Option<Vec<u8>> {
    if sealed.len() < SEAL_OVERHEAD {
        return None;
    }

    let (nonce, rest) = sealed.split_at(NONCE_SIZE);
    let (tag, body) = rest.split_at(TAG_SIZE);

    let cipher = Aead::new(GenericArray::from_slice(key));

    let mut plain = body.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            &[],
            &mut plain,
            GenericArray::from_slice(tag),
        )
        .ok()?;

    Some(plain)
}

/// SHA-256 digest of the supplied bytes.
#[inline]
pub fn digest(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Fills the provided buffer with cryptographically secure random bytes.
#[inline]
pub fn random_bytes(out: &mut [u8]) {
    OsRng.fill_bytes(out);
}
