use image::{DynamicImage, GrayImage};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to encode prepared image: {0}")]
    Encode(String),
}

/// Decode uploaded bytes (JPEG / PNG / WEBP / …) and produce PNG bytes the
/// OCR engine can consume: printed receipts are dark ink on a light ground,
/// so the page is thresholded to pure black-and-white rather than kept in
/// grayscale.
pub fn prepare_for_ocr(data: &[u8]) -> Result<Vec<u8>, PrepareError> {
    let img = image::load_from_memory(data)?;
    to_png(binarize(img))
}

/// Downscale oversized scans, flatten to luma, and split ink from paper at
/// the Otsu threshold.
fn binarize(img: DynamicImage) -> GrayImage {
    // Phone photos of receipts routinely exceed what Tesseract needs; past
    // ~2800px extra resolution only costs time.
    let img = if img.width() > 2800 || img.height() > 2800 {
        img.resize(2800, 2800, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let mut gray = img.to_luma8();
    let threshold = otsu_threshold(&gray);
    for pixel in gray.pixels_mut() {
        pixel[0] = if pixel[0] <= threshold { 0 } else { 255 };
    }
    gray
}

/// Otsu's method: pick the cut that maximizes between-class variance of the
/// luma histogram. A uniform page degenerates to threshold 0, which leaves
/// it all background.
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let total = (gray.width() as u64) * (gray.height() as u64);
    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut background_count = 0u64;
    let mut background_sum = 0.0f64;
    let mut best_threshold = 0u8;
    let mut best_variance = 0.0f64;

    for t in 0..256usize {
        background_count += histogram[t];
        if background_count == 0 {
            continue;
        }
        let foreground_count = total - background_count;
        if foreground_count == 0 {
            break;
        }
        background_sum += t as f64 * histogram[t] as f64;

        let mean_bg = background_sum / background_count as f64;
        let mean_fg = (weighted_sum - background_sum) / foreground_count as f64;
        let variance = background_count as f64
            * foreground_count as f64
            * (mean_bg - mean_fg)
            * (mean_bg - mean_fg);

        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

fn to_png(img: GrayImage) -> Result<Vec<u8>, PrepareError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PrepareError::Encode(e.to_string()))?;
    Ok(buf)
}
