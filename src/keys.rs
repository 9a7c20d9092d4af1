//! The DICE derivation chain from spec §4.3: `CDI' -> DeviceID -> AliasID`.
//! Each layer's key is a deterministic function of the layer below plus
//! layer-specific measurement data, so the same inputs always reproduce
//! the same keypair (§4.3 invariant) — grounded on the original's
//! `lz_core_derive_device_id`/`lz_core_derive_alias_id_keypair`.

use crate::crypto::{self, Keypair};
use crate::error::CryptoError;
use crate::types::Digest;

/// `DeviceID = KeyGen(CDI')`. `cdi_prime` is used directly as the key-
/// derivation seed, with no hashing step in between — matching the
/// original `lz_core_derive_device_id`, which passes `cdi_prime` straight
/// into `lz_derive_ecc_keypair`. Wire-compatibility-critical per spec §4.3.
pub fn derive_device_id(cdi_prime: &[u8; 32]) -> Result<Keypair, CryptoError> {
    crypto::derive_ecc_keypair(cdi_prime)
}

/// `AliasID = KeyGen(SHA-256(next_layer_digest ‖ device_id_priv_pem))`.
///
/// The original passes `sizeof(digest)` — a pointer's size, not the
/// digest's — as the length argument to the underlying derivation call,
/// so on a 32-bit target it silently truncates the digest to 4 bytes
/// before mixing it in. Resolved per spec §9: this implementation always
/// mixes in the full 32-byte digest. The concatenation order and the use
/// of the PEM-encoded private key (not the raw scalar) match the original
/// `lz_core_run`'s `lz_sha256_two_parts(digest, next_layer_digest, ..., &pem, ...)`.
pub fn derive_alias_id(
    next_layer_digest: &Digest,
    device_id_priv_pem: &str,
) -> Result<Keypair, CryptoError> {
    let seed = crypto::sha256_concat(&[next_layer_digest, device_id_priv_pem.as_bytes()]);
    crypto::derive_ecc_keypair(&seed)
}
