//! Builds the RAM certificate bag handed to the next stage (§4.7),
//! grounded on the original's `lz_core_create_cert_store`: the hub
//! certificate, the DeviceID certificate, and a freshly synthesized
//! AliasID certificate are appended to one flat byte bag in that order,
//! with a parallel table recording each entry's offset and length.

use crate::error::LazarusError;
use crate::platform::{CertSubject, Platform};
use crate::types::{
    CertTableEntry, ImgCertSlot, ImgCertStore, TrustAnchorCertSlot, TrustAnchors, CERT_BAG_LEN, LZ_MAGIC,
    PEM_MAX_LEN,
};
use heapless::Vec;
use p256::ecdsa::SigningKey;

/// Appends `cert` followed by a single NUL terminator, recording the table
/// entry's `size` as the cert length alone (not counting the terminator) —
/// matching the original's `certBag[cursor++] = '\0'` after each copy.
fn append_cert(
    bag: &mut Vec<u8, CERT_BAG_LEN>,
    cursor: &mut u32,
    cert: &[u8],
) -> Result<CertTableEntry, LazarusError> {
    let start = *cursor;
    bag.extend_from_slice(cert).map_err(|_| LazarusError::CertStoreOverflow)?;
    bag.push(0).map_err(|_| LazarusError::CertStoreOverflow)?;
    *cursor += cert.len() as u32 + 1;
    Ok(CertTableEntry { start, size: cert.len() as u32 })
}

/// `serial` is the AliasID certificate's serial number; callers derive it
/// from the boot counter or a timestamp so re-synthesized certificates
/// across boots don't collide.
pub fn build_cert_store<P: Platform>(
    platform: &P,
    trust_anchors: &TrustAnchors,
    device_id_pub_pem: &str,
    device_id_priv: &SigningKey,
    alias_id_pub_pem: &str,
    serial: u64,
) -> Result<ImgCertStore, LazarusError> {
    let mut store = ImgCertStore::default();
    let mut cursor: u32 = 0;

    let hub_entry = &trust_anchors.cert_table[TrustAnchorCertSlot::Hub as usize];
    let hub_cert = trust_anchors
        .cert_bag
        .get(hub_entry.start as usize..(hub_entry.start + hub_entry.size) as usize)
        .ok_or(LazarusError::NotFound)?;
    store.cert_table[ImgCertSlot::Hub as usize] = append_cert(&mut store.cert_bag, &mut cursor, hub_cert)?;

    let device_id_entry = &trust_anchors.cert_table[TrustAnchorCertSlot::DeviceId as usize];
    let device_id_cert = trust_anchors
        .cert_bag
        .get(device_id_entry.start as usize..(device_id_entry.start + device_id_entry.size) as usize)
        .ok_or(LazarusError::NotFound)?;
    store.cert_table[ImgCertSlot::DeviceId as usize] =
        append_cert(&mut store.cert_bag, &mut cursor, device_id_cert)?;

    let device_id_subject = CertSubject { common_name: "Lazarus DeviceID", org: "Lazarus", country: "DE" };
    let alias_id_subject = CertSubject { common_name: "Lazarus AliasID", org: "Lazarus", country: "DE" };
    let alias_id_cert = platform.issue_cert(
        &device_id_subject,
        &alias_id_subject,
        alias_id_pub_pem,
        device_id_priv,
        serial,
    )?;
    store.cert_table[ImgCertSlot::AliasId as usize] =
        append_cert(&mut store.cert_bag, &mut cursor, alias_id_cert.as_bytes())?;

    store.cursor = cursor;
    let mut dev_pub_key_pem = heapless::String::<PEM_MAX_LEN>::new();
    dev_pub_key_pem
        .push_str(device_id_pub_pem)
        .map_err(|_| LazarusError::CertStoreOverflow)?;
    store.dev_pub_key_pem = dev_pub_key_pem;
    store.management_pub_key_pem = trust_anchors.management_pub_key.clone();
    store.magic = LZ_MAGIC;

    Ok(store)
}
