//! Walks the append-only staging area (§4.5), styled on the tagged-record
//! walk in `loader/src/args.rs`'s `KernelArgumentsIterator` — same idea of
//! stepping a cursor across a flat byte region one self-describing record
//! at a time until a bad tag ends the scan, applied here to signed
//! staging tickets instead of kernel arguments.

use crate::crypto;
use crate::error::LazarusError;
use crate::types::{HeaderType, Nonce, StagingRecordHeader, LZ_MAGIC};
use p256::ecdsa::VerifyingKey;

/// Yields `(header, payload)` pairs from a raw staging-area byte slice,
/// stopping at the first position that doesn't parse as a well-formed
/// header — an empty or exhausted staging area simply yields nothing.
pub struct StagingIter<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> StagingIter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self { StagingIter { bytes, offset: 0 } }
}

impl<'a> Iterator for StagingIter<'a> {
    type Item = (StagingRecordHeader, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.bytes.get(self.offset..)?;
        let header = StagingRecordHeader::parse(remaining)?;
        let payload_start = StagingRecordHeader::WIRE_LEN;
        let payload_end = payload_start.checked_add(header.content.payload_size as usize)?;
        let payload = remaining.get(payload_start..payload_end)?;
        self.offset += payload_end;
        Some((header, payload))
    }
}

/// Raw record count, no signature checking — used only for the
/// empty-staging-area check in §4.8/§4.10, never as a trust decision.
pub fn count_elements(staging: &[u8]) -> usize { StagingIter::new(staging).count() }

/// First record of `kind`, regardless of whether it verifies.
pub fn find_header(staging: &[u8], kind: HeaderType) -> Option<(StagingRecordHeader, &[u8])> {
    StagingIter::new(staging).find(|(h, _)| h.content.r#type == kind)
}

/// Full authentication of one staging record: magic, nonce freshness,
/// signature, and payload-digest binding all have to hold.
pub fn verify_header(
    header: &StagingRecordHeader,
    payload: &[u8],
    verify_key: &VerifyingKey,
    expected_nonce: &Nonce,
) -> Result<(), LazarusError> {
    if header.content.magic != LZ_MAGIC {
        return Err(LazarusError::StagingInvalid);
    }
    if header.content.payload_size == 0 {
        return Err(LazarusError::StagingInvalid);
    }
    if header.content.nonce != *expected_nonce {
        return Err(LazarusError::StagingInvalid);
    }
    crypto::ecdsa_verify(verify_key, &header.content.to_bytes(), &header.signature)
        .map_err(|_| LazarusError::StagingInvalid)?;

    if header.content.payload_size as usize != payload.len() {
        return Err(LazarusError::StagingInvalid);
    }
    let digest = crypto::sha256(payload);
    if digest != header.content.digest {
        return Err(LazarusError::StagingInvalid);
    }
    Ok(())
}

/// Whether a fully-verified record of `kind` is present, consuming the
/// given nonce as the expected replay-protection value.
pub fn has_valid(
    staging: &[u8],
    kind: HeaderType,
    verify_key: &VerifyingKey,
    expected_nonce: &Nonce,
) -> bool {
    match find_header(staging, kind) {
        Some((header, payload)) => verify_header(&header, payload, verify_key, expected_nonce).is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use crate::types::{StagingHeaderContent, MAX_SIG_DER_LEN};
    use rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn encode_record(content: &StagingHeaderContent, key: &p256::ecdsa::SigningKey, payload: &[u8]) -> heapless::Vec<u8, 4096> {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let sig = crypto::ecdsa_sign(key, &content.to_bytes(), &mut rng).unwrap();
        let mut out: heapless::Vec<u8, 4096> = heapless::Vec::new();
        out.extend_from_slice(&content.to_bytes()).unwrap();
        out.push(sig.len).unwrap();
        let mut sig_padded = [0u8; MAX_SIG_DER_LEN];
        sig_padded[..sig.as_bytes().len()].copy_from_slice(sig.as_bytes());
        out.extend_from_slice(&sig_padded).unwrap();
        out.extend_from_slice(payload).unwrap();
        out
    }

    #[test]
    fn empty_staging_area_has_no_elements() {
        assert_eq!(count_elements(&[]), 0);
    }

    #[test]
    fn finds_and_verifies_a_well_formed_ticket() {
        let signer = keys::derive_device_id(&[1u8; 32]).unwrap();
        let payload = b"ticket payload";
        let nonce = [9u8; 16];
        let content = StagingHeaderContent {
            magic: LZ_MAGIC,
            r#type: HeaderType::BootTicket,
            payload_size: payload.len() as u32,
            digest: crypto::sha256(payload),
            nonce,
            issue_time: 10,
        };
        let record = encode_record(&content, signer.private(), payload);
        assert_eq!(count_elements(&record), 1);
        assert!(has_valid(&record, HeaderType::BootTicket, &signer.public(), &nonce));
    }

    #[test]
    fn rejects_zero_length_payload() {
        let signer = keys::derive_device_id(&[8u8; 32]).unwrap();
        let nonce = [9u8; 16];
        let content = StagingHeaderContent {
            magic: LZ_MAGIC,
            r#type: HeaderType::BootTicket,
            payload_size: 0,
            digest: crypto::sha256(&[]),
            nonce,
            issue_time: 10,
        };
        let record = encode_record(&content, signer.private(), &[]);
        assert!(!has_valid(&record, HeaderType::BootTicket, &signer.public(), &nonce));
    }

    #[test]
    fn rejects_stale_nonce() {
        let signer = keys::derive_device_id(&[2u8; 32]).unwrap();
        let payload = b"ticket payload";
        let nonce = [9u8; 16];
        let content = StagingHeaderContent {
            magic: LZ_MAGIC,
            r#type: HeaderType::BootTicket,
            payload_size: payload.len() as u32,
            digest: crypto::sha256(payload),
            nonce,
            issue_time: 10,
        };
        let record = encode_record(&content, signer.private(), payload);
        let stale_nonce = [0u8; 16];
        assert!(!has_valid(&record, HeaderType::BootTicket, &signer.public(), &stale_nonce));
    }
}
