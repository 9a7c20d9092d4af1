//! Next-stage selection (§4.8) and core-update detection (§4.10),
//! grounded on the boot-mode branches and `lz_core_is_updated` in the
//! original's `lz_core_run`.

use crate::error::LazarusError;
use crate::platform::Platform;
use crate::staging;
use crate::types::{BootMode, HeaderType, Nonce, TrustAnchors};
use p256::ecdsa::VerifyingKey;

/// Used when no deferral ticket names an explicit deferral time (§4.9).
pub const DEFAULT_DEFERRAL_TIME_S: u32 = 300;

/// Picks the next stage per §4.8's selection rule, run *after* update
/// application so `core_update_applied` reflects a ticket that has already
/// passed full verification (signature, nonce, digest) rather than a
/// staging record that merely parses:
/// - an empty staging area always means "go talk to the Update Downloader"
/// - a verified CORE_UPDATE having just been applied means the Core Patcher
///   needs to run first
/// - a valid boot ticket addressed at `cur_nonce` means the App may run
/// - anything else (unrecognized garbage, a ticket for the wrong nonce)
///   falls back to the Update Downloader
pub fn select_mode(staging: &[u8], hub_key: &VerifyingKey, cur_nonce: &Nonce, core_update_applied: bool) -> BootMode {
    if staging::count_elements(staging) == 0 {
        return BootMode::UpdateDownloader;
    }

    if core_update_applied {
        return BootMode::CorePatcher;
    }

    if staging::has_valid(staging, HeaderType::BootTicket, hub_key, cur_nonce) {
        return BootMode::App;
    }

    BootMode::UpdateDownloader
}

/// Looks up how long the App should defer before re-contacting the hub.
/// Logs and falls back to `DEFAULT_DEFERRAL_TIME_S` when no valid deferral
/// ticket is present — this is only ever called after `select_mode` has
/// already decided to stay in `App`, so the fallback is a "run anyway with
/// a conservative timer" default, not an error.
pub fn deferral_time<P: Platform>(
    platform: &mut P,
    staging: &[u8],
    hub_key: &VerifyingKey,
    cur_nonce: &Nonce,
) -> u32 {
    match staging::find_header(staging, HeaderType::DeferralTicket) {
        Some((header, payload)) if staging::verify_header(&header, payload, hub_key, cur_nonce).is_ok() => {
            if payload.len() >= 4 {
                u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
            } else {
                crate::warn_log!(platform, "deferral ticket payload too short, using default");
                DEFAULT_DEFERRAL_TIME_S
            }
        }
        _ => {
            crate::warn_log!(platform, "no valid deferral ticket, using default deferral time");
            DEFAULT_DEFERRAL_TIME_S
        }
    }
}

/// True if the DeviceID key this boot derived differs from the one
/// recorded in the Trust Anchors — the signal that Core itself was
/// updated since the last boot (the DeviceID is derived from Core's own
/// measurement, so a different Core binary yields a different DeviceID).
/// An empty stored key (the all-zero Trust Anchors on the very first boot)
/// counts as a mismatch too: there is nothing to compare against, so a
/// fresh CSR has to be issued just the same.
pub fn core_was_updated<P: Platform>(
    platform: &P,
    trust_anchors: &TrustAnchors,
    fresh_device_id_pub: &VerifyingKey,
) -> Result<bool, LazarusError> {
    if trust_anchors.dev_pub_key.is_empty() {
        return Ok(true);
    }
    let stored = platform
        .pem_to_pub_key(&trust_anchors.dev_pub_key)
        .map_err(|_| LazarusError::BootParamsCorrupt)?;
    Ok(!crate::crypto::compare_public(&stored, fresh_device_id_pub))
}
