//! Typed access to the flash-backed Data Store and image slots (§4.2).
//! Wraps a `Platform` and turns its raw bool/byte-slice contract into
//! validated `Result`s, so the rest of the engine never has to re-check
//! magics after every read.

use crate::error::LazarusError;
use crate::platform::{Platform, Stage};
use crate::types::{ConfigData, ImageHeader, TrustAnchors};

pub struct FlashStore<'p, P: Platform> {
    platform: &'p mut P,
}

impl<'p, P: Platform> FlashStore<'p, P> {
    pub fn new(platform: &'p mut P) -> Self { FlashStore { platform } }

    pub fn platform(&self) -> &P { self.platform }
    pub fn platform_mut(&mut self) -> &mut P { self.platform }

    pub fn config(&self) -> Result<ConfigData, LazarusError> {
        let data = self.platform.read_config_data();
        Ok(data)
    }

    pub fn trust_anchors(&self) -> Result<TrustAnchors, LazarusError> {
        let anchors = self.platform.read_trust_anchors();
        if !anchors.is_valid() {
            return Err(LazarusError::NotFound);
        }
        Ok(anchors)
    }

    /// Reads the Trust Anchors region without requiring `magic == LZ_MAGIC`
    /// first — needed on and after initial boot, before the hub has
    /// finished provisioning the device.
    pub fn trust_anchors_raw(&self) -> TrustAnchors { self.platform.read_trust_anchors() }

    pub fn write_config(&mut self, data: &ConfigData) -> Result<(), LazarusError> {
        if self.platform.write_config(data) {
            Ok(())
        } else {
            Err(LazarusError::FlashFailure)
        }
    }

    pub fn write_trust_anchors(&mut self, anchors: &TrustAnchors) -> Result<(), LazarusError> {
        if self.platform.write_trust_anchors(anchors) {
            Ok(())
        } else {
            Err(LazarusError::FlashFailure)
        }
    }

    pub fn write_image_meta(
        &mut self,
        stage: Stage,
        version: u32,
        issue_time: u32,
    ) -> Result<(), LazarusError> {
        if self.platform.write_image_meta(stage, version, issue_time) {
            Ok(())
        } else {
            Err(LazarusError::FlashFailure)
        }
    }

    pub fn write_image(&mut self, stage: Stage, header: &[u8], code: &[u8]) -> Result<(), LazarusError> {
        if self.platform.write_image(stage, header, code) {
            Ok(())
        } else {
            Err(LazarusError::FlashFailure)
        }
    }

    pub fn erase_staging(&mut self) -> Result<(), LazarusError> {
        if self.platform.erase_staging() {
            Ok(())
        } else {
            Err(LazarusError::FlashFailure)
        }
    }

    pub fn erase_data_store(&mut self) -> Result<(), LazarusError> {
        if self.platform.erase_data_store() {
            Ok(())
        } else {
            Err(LazarusError::FlashFailure)
        }
    }

    /// Parses the header for `stage`'s image and returns it alongside the
    /// code slice it describes.
    pub fn image(&self, stage: Stage) -> Result<(ImageHeader, &[u8]), LazarusError> {
        let header_bytes = self.platform.image_header(stage);
        let header = ImageHeader::parse(header_bytes).ok_or(LazarusError::ImageInvalid)?;
        if !header.is_valid_magic() {
            return Err(LazarusError::ImageInvalid);
        }
        Ok((header, self.platform.image_code(stage)))
    }
}
