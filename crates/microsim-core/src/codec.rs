//! Image payload preparation: raw passthrough or N×N sum binning to TIFF.
//!
//! Binning decodes the image, sums each N×N block of native samples and
//! re-encodes the result as an unsigned 16-bit TIFF. This is the slowest
//! stage of a run, so it is executed on a blocking thread under a timeout.

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, Rgba};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::CodecError;

/// Prepares the bytes sent for each image.
#[derive(Debug, Clone, Default)]
pub struct ImageCodec {
    limits: LimitsConfig,
}

impl ImageCodec {
    /// Create a codec with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Produce the payload for `path`.
    ///
    /// With `binning = None` the file's bytes are returned unchanged (the
    /// caller guarantees they are already in wire format). With `Some(n)` the
    /// image is binned n×n and re-encoded as 16-bit TIFF.
    pub async fn prepare(&self, path: &Path, binning: Option<u32>) -> Result<Vec<u8>, CodecError> {
        let factor = match binning {
            Some(0) => {
                return Err(CodecError::InvalidArgument(
                    "binning must be a positive integer".to_string(),
                ))
            }
            other => other,
        };

        self.check_size(path).await?;

        let bytes = tokio::fs::read(path).await.map_err(|e| CodecError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let Some(factor) = factor else {
            return Ok(bytes);
        };

        let path_owned = path.to_path_buf();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);
        let result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || bin_bytes(&bytes, factor, &path_owned)).await
        })
        .await;

        match result {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => Err(CodecError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {e}"),
            }),
            Err(_) => Err(CodecError::Timeout {
                path: path.to_path_buf(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    async fn check_size(&self, path: &Path) -> Result<(), CodecError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| CodecError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let max_bytes = self.limits.max_file_size_mb.saturating_mul(1024 * 1024);
        if metadata.len() > max_bytes {
            return Err(CodecError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }
        Ok(())
    }
}

/// Decode, bin and re-encode an in-memory image (runs in spawn_blocking).
fn bin_bytes(bytes: &[u8], factor: u32, path: &Path) -> Result<Vec<u8>, CodecError> {
    let image = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot detect image format: {e}"),
        })?
        .decode()
        .map_err(|e| CodecError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let binned = bin_image(&image, factor)?;
    encode_tiff(&binned).map_err(|e| CodecError::Encode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Sum-reduce `image` over `factor`×`factor` blocks.
///
/// Edge blocks are zero-padded, so the output is `ceil(w/n)` × `ceil(h/n)`.
/// Samples keep their native scale; sums saturate at `u16::MAX`. Alpha is
/// dropped from luma-alpha images, and float images are converted to 16-bit
/// first.
pub fn bin_image(image: &DynamicImage, factor: u32) -> Result<DynamicImage, CodecError> {
    if factor == 0 {
        return Err(CodecError::InvalidArgument(
            "binning must be a positive integer".to_string(),
        ));
    }

    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidArgument(format!(
            "cannot bin an empty {width}x{height} image"
        )));
    }
    let binned = match image {
        DynamicImage::ImageLuma8(buf) => {
            luma(block_sum(buf.as_raw(), width, height, 1, 1, factor), width, height, factor)
        }
        DynamicImage::ImageLuma16(buf) => {
            luma(block_sum(buf.as_raw(), width, height, 1, 1, factor), width, height, factor)
        }
        DynamicImage::ImageLumaA8(buf) => {
            luma(block_sum(buf.as_raw(), width, height, 2, 1, factor), width, height, factor)
        }
        DynamicImage::ImageLumaA16(buf) => {
            luma(block_sum(buf.as_raw(), width, height, 2, 1, factor), width, height, factor)
        }
        DynamicImage::ImageRgb8(buf) => {
            rgb(block_sum(buf.as_raw(), width, height, 3, 3, factor), width, height, factor)
        }
        DynamicImage::ImageRgb16(buf) => {
            rgb(block_sum(buf.as_raw(), width, height, 3, 3, factor), width, height, factor)
        }
        DynamicImage::ImageRgba8(buf) => {
            rgba(block_sum(buf.as_raw(), width, height, 4, 4, factor), width, height, factor)
        }
        DynamicImage::ImageRgba16(buf) => {
            rgba(block_sum(buf.as_raw(), width, height, 4, 4, factor), width, height, factor)
        }
        DynamicImage::ImageRgb32F(_) => {
            let buf = image.to_rgb16();
            rgb(block_sum(buf.as_raw(), width, height, 3, 3, factor), width, height, factor)
        }
        other => {
            let buf = other.to_rgba16();
            rgba(block_sum(buf.as_raw(), width, height, 4, 4, factor), width, height, factor)
        }
    };

    binned.ok_or_else(|| {
        CodecError::InvalidArgument(format!(
            "cannot bin a {width}x{height} image by {factor}"
        ))
    })
}

/// Encode an image as TIFF into memory.
pub fn encode_tiff(image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Tiff)?;
    Ok(buffer.into_inner())
}

fn binned_dims(width: u32, height: u32, factor: u32) -> (u32, u32) {
    (width.div_ceil(factor), height.div_ceil(factor))
}

/// Sum interleaved samples over blocks, keeping the first `keep` of `stride`
/// channels per pixel.
fn block_sum<T>(
    samples: &[T],
    width: u32,
    height: u32,
    stride: usize,
    keep: usize,
    factor: u32,
) -> Vec<u16>
where
    T: Copy + Into<u64>,
{
    let (out_w, out_h) = binned_dims(width, height, factor);
    let (width, factor) = (width as usize, factor as usize);
    let (out_w, out_h) = (out_w as usize, out_h as usize);

    let mut sums = vec![0u64; out_w * out_h * keep];
    for (y, row) in samples.chunks_exact(width * stride).enumerate() {
        let out_row = (y / factor) * out_w;
        for (x, pixel) in row.chunks_exact(stride).enumerate() {
            let base = (out_row + x / factor) * keep;
            for (c, sample) in pixel.iter().take(keep).enumerate() {
                sums[base + c] += (*sample).into();
            }
        }
    }

    sums.into_iter()
        .map(|s| s.min(u64::from(u16::MAX)) as u16)
        .collect()
}

fn luma(data: Vec<u16>, width: u32, height: u32, factor: u32) -> Option<DynamicImage> {
    let (w, h) = binned_dims(width, height, factor);
    ImageBuffer::<Luma<u16>, _>::from_raw(w, h, data).map(DynamicImage::ImageLuma16)
}

fn rgb(data: Vec<u16>, width: u32, height: u32, factor: u32) -> Option<DynamicImage> {
    let (w, h) = binned_dims(width, height, factor);
    ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, data).map(DynamicImage::ImageRgb16)
}

fn rgba(data: Vec<u16>, width: u32, height: u32, factor: u32) -> Option<DynamicImage> {
    let (w, h) = binned_dims(width, height, factor);
    ImageBuffer::<Rgba<u16>, _>::from_raw(w, h, data).map(DynamicImage::ImageRgba16)
}
