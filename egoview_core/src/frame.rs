//! Camera frame buffer conversion.
//!
//! The sensor delivers raw BGRA bytes; the overlay and display side work on
//! opaque RGBA images.

use image::RgbaImage;
use thiserror::Error;

/// Errors for camera buffer conversion.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Buffer of {got} bytes does not match {width}x{height} BGRA ({expected} bytes)")]
    LengthMismatch {
        width: u32,
        height: u32,
        got: usize,
        expected: usize,
    },

    #[error("Zero-sized frame ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },
}

/// Converts a raw BGRA sensor buffer into an opaque RGBA image.
///
/// The blue and red channels swap places and the alpha channel is forced
/// opaque, matching how the reference client drops the sensor's alpha before
/// blitting.
pub fn bgra_to_rgba(width: u32, height: u32, bgra: &[u8]) -> Result<RgbaImage, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::ZeroSized { width, height });
    }

    let expected = width as usize * height as usize * 4;
    if bgra.len() != expected {
        return Err(FrameError::LengthMismatch {
            width,
            height,
            got: bgra.len(),
            expected,
        });
    }

    let mut rgba = Vec::with_capacity(expected);
    for pixel in bgra.chunks_exact(4) {
        rgba.extend_from_slice(&[pixel[2], pixel[1], pixel[0], 255]);
    }

    RgbaImage::from_raw(width, height, rgba).ok_or(FrameError::LengthMismatch {
        width,
        height,
        got: bgra.len(),
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_swap_and_alpha_goes_opaque() {
        // Two pixels: pure blue and pure red, both translucent on the wire.
        let bgra = [255, 0, 0, 10, 0, 0, 255, 10];
        let image = bgra_to_rgba(2, 1, &bgra).expect("valid buffer");

        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = bgra_to_rgba(2, 2, &[0u8; 15]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch { expected: 16, got: 15, .. }
        ));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(matches!(
            bgra_to_rgba(0, 4, &[]),
            Err(FrameError::ZeroSized { .. })
        ));
    }
}
