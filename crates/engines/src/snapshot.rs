//! PNG output of a [`RasterSurface`].
//!
//! This module is feature-gated behind `png` (default on) so that WASM builds
//! can depend on the `engines` crate without pulling in the `image` crate.

use crate::raster::RasterSurface;
use fieldglow_core::color::Rgba;
use fieldglow_core::error::EngineError;
use std::path::Path;
use tracing::info;

/// Writes the surface as an opaque PNG, composited over `backdrop`.
///
/// Returns `EngineError::InvalidDimensions` if the surface is empty or its
/// dimensions overflow `u32`, or `EngineError::Io` on write failure.
pub fn write_png(surface: &RasterSurface, backdrop: Rgba, path: &Path) -> Result<(), EngineError> {
    if surface.width() == 0 || surface.height() == 0 {
        return Err(EngineError::InvalidDimensions);
    }
    let w = u32::try_from(surface.width()).map_err(|_| EngineError::InvalidDimensions)?;
    let h = u32::try_from(surface.height()).map_err(|_| EngineError::InvalidDimensions)?;
    let img = image::RgbaImage::from_raw(w, h, surface.flatten_rgba8(backdrop))
        .ok_or_else(|| EngineError::Io("RGBA buffer size mismatch".into()))?;
    img.save(path).map_err(|e| EngineError::Io(e.to_string()))?;
    info!(path = %path.display(), width = w, height = h, "snapshot written");
    Ok(())
}
