//! Next-layer image verification, spec §4.4's six-step algorithm, grounded
//! on the original's `lz_core_verify_image`.

use crate::crypto;
use crate::error::LazarusError;
use crate::types::{Digest, ImageHeader, ImgMeta};
use p256::ecdsa::VerifyingKey;

/// Verifies `header`/`code` against `verify_key` and the rollback state in
/// `meta`, returning the code digest on success (callers fold it into the
/// AliasID derivation, §4.3).
///
/// 1. header magic must be `LZ_MAGIC`
/// 2. header signature must verify under `verify_key`
/// 3. `code.len()` must match the size the header declares
/// 4. the code's SHA-256 digest must match the header's declared digest
/// 5. version must not roll back relative to `meta`
/// 6. issue_time must not roll back relative to `meta`, independent of (5)
pub fn verify_image(
    header: &ImageHeader,
    code: &[u8],
    verify_key: &VerifyingKey,
    meta: &ImgMeta,
) -> Result<Digest, LazarusError> {
    if !header.is_valid_magic() {
        return Err(LazarusError::ImageInvalid);
    }

    crypto::ecdsa_verify(verify_key, &header.content.to_bytes(), &header.signature)
        .map_err(|_| LazarusError::ImageInvalid)?;

    if code.len() as u32 != header.content.size {
        return Err(LazarusError::ImageInvalid);
    }

    let digest = crypto::sha256(code);
    if digest != header.content.digest {
        return Err(LazarusError::ImageInvalid);
    }

    if meta.is_valid() {
        let rolled_back =
            header.content.version < meta.last_version || header.content.issue_time < meta.last_issue_time;
        if rolled_back {
            return Err(LazarusError::ImageInvalid);
        }
    }

    Ok(digest)
}
