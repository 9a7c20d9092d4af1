//! Applies verified update tickets out of the staging area (§4.6),
//! grounded on the original's `lz_apply_updates`/`lz_std_updates_pending`.
//! A ticket only authorizes writing a new image or config region; the
//! image payload itself still has to carry a valid signature under the
//! code-authenticity key before it's flashed — two independent trust
//! anchors have to agree, not just the one that signed the ticket.

use crate::crypto;
use crate::error::LazarusError;
use crate::flash::FlashStore;
use crate::platform::{Platform, Stage};
use crate::staging::{self, StagingIter};
use crate::types::{HeaderType, ImageHeader, NwInfo, Nonce, LZ_MAGIC, NW_INFO_LEN};
use p256::ecdsa::VerifyingKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedUpdates {
    pub core: bool,
    pub update_downloader: bool,
    pub core_patcher: bool,
    pub app: bool,
    pub config: bool,
}

impl AppliedUpdates {
    pub fn any(&self) -> bool {
        self.core || self.update_downloader || self.core_patcher || self.app || self.config
    }
}

/// Walks every update-kind ticket in `staging`, verifies it under
/// `ticket_key`/`expected_nonce`, and applies whichever ones check out.
/// A ticket that fails verification is skipped rather than aborting the
/// whole pass — one bad ticket shouldn't block unrelated ones.
pub fn apply_updates<P: Platform>(
    staging: &[u8],
    flash: &mut FlashStore<P>,
    ticket_key: &VerifyingKey,
    code_auth_key: &VerifyingKey,
    expected_nonce: &Nonce,
) -> Result<AppliedUpdates, LazarusError> {
    let mut applied = AppliedUpdates::default();

    for (header, payload) in StagingIter::new(staging) {
        if !header.content.r#type.is_update_kind() {
            continue;
        }
        if staging::verify_header(&header, payload, ticket_key, expected_nonce).is_err() {
            continue;
        }

        match header.content.r#type {
            HeaderType::CoreUpdate => {
                apply_image_update(flash, Stage::Core, payload, code_auth_key)?;
                applied.core = true;
            }
            HeaderType::UdownloaderUpdate => {
                apply_image_update(flash, Stage::UpdateDownloader, payload, code_auth_key)?;
                applied.update_downloader = true;
            }
            HeaderType::CpatcherUpdate => {
                apply_image_update(flash, Stage::CorePatcher, payload, code_auth_key)?;
                applied.core_patcher = true;
            }
            HeaderType::AppUpdate => {
                apply_image_update(flash, Stage::App, payload, code_auth_key)?;
                applied.app = true;
            }
            HeaderType::ConfigUpdate => {
                apply_config_update(flash, payload)?;
                applied.config = true;
            }
            _ => unreachable!("filtered by is_update_kind above"),
        }
    }

    Ok(applied)
}

fn apply_image_update<P: Platform>(
    flash: &mut FlashStore<P>,
    stage: Stage,
    payload: &[u8],
    code_auth_key: &VerifyingKey,
) -> Result<(), LazarusError> {
    let header = ImageHeader::parse(payload).ok_or(LazarusError::ImageInvalid)?;
    if !header.is_valid_magic() {
        return Err(LazarusError::ImageInvalid);
    }
    crypto::ecdsa_verify(code_auth_key, &header.content.to_bytes(), &header.signature)
        .map_err(|_| LazarusError::ImageInvalid)?;

    let hdr_size = header.content.hdr_size as usize;
    let header_bytes = payload.get(..hdr_size).ok_or(LazarusError::ImageInvalid)?;
    let code = payload.get(hdr_size..).ok_or(LazarusError::ImageInvalid)?;
    if code.len() as u32 != header.content.size {
        return Err(LazarusError::ImageInvalid);
    }

    flash.write_image(stage, header_bytes, code)?;
    flash.write_image_meta(stage, header.content.version, header.content.issue_time)
}

/// Config updates only ever refresh the Update Downloader's network
/// credentials (§3's `nw_info`) in this implementation.
fn apply_config_update<P: Platform>(flash: &mut FlashStore<P>, payload: &[u8]) -> Result<(), LazarusError> {
    let mut config = flash.config()?;
    let mut nw_info = NwInfo { magic: LZ_MAGIC, data: [0u8; NW_INFO_LEN] };
    let n = core::cmp::min(payload.len(), NW_INFO_LEN);
    nw_info.data[..n].copy_from_slice(&payload[..n]);
    config.nw_info = nw_info;
    flash.write_config(&config)
}
