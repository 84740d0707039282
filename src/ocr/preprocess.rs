use image::{DynamicImage, GrayImage, Luma};

/// Grayscale then hard threshold: pixels brighter than `threshold` become
/// white, everything else black. Transparent pixels are composited on white.
pub fn binarize_for_ocr(image: &DynamicImage, threshold: u8) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let blend = |channel: u8| channel as f32 * alpha + 255.0 * (1.0 - alpha);
        let luma = 0.299 * blend(r) + 0.587 * blend(g) + 0.114 * blend(b);
        let value = if luma.round() as u8 > threshold { 255 } else { 0 };
        output.put_pixel(x, y, Luma([value]));
    }

    DynamicImage::ImageLuma8(output)
}
