//! Data Augmentation Module
//!
//! On-the-fly augmentations applied to training images only; validation and
//! test images go through deterministic resize + rescale. The transform set
//! mirrors what chest X-rays tolerate: small rotations, mild zoom, and
//! horizontal flips. Out-of-frame regions introduced by rotation or zoom-out
//! are filled with black, matching the constant-fill convention of the
//! upstream dataset tooling.

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use rand::Rng;

/// Configuration for data augmentation
#[derive(Clone, Debug)]
pub struct AugmentationConfig {
    /// Maximum rotation angle in degrees (applies ±rotation_degrees)
    pub rotation_degrees: f32,
    /// Zoom range: scale factor drawn from 1.0 ± zoom_range
    pub zoom_range: f32,
    /// Probability of applying horizontal flip (0.0 - 1.0)
    pub horizontal_flip_prob: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_degrees: 15.0,
            zoom_range: 0.1,
            horizontal_flip_prob: 0.5,
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations (for validation/inference)
    pub fn none() -> Self {
        Self {
            rotation_degrees: 0.0,
            zoom_range: 0.0,
            horizontal_flip_prob: 0.0,
        }
    }
}

/// Image augmenter that applies random transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    /// Create a new augmenter with the given configuration
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Create an augmenter with the default training transforms
    pub fn with_defaults() -> Self {
        Self::new(AugmentationConfig::default())
    }

    /// Apply the configured augmentations randomly to an image
    pub fn augment<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let mut result = img;

        if self.config.rotation_degrees > 0.0 {
            let angle =
                rng.gen_range(-self.config.rotation_degrees..=self.config.rotation_degrees);
            result = self.rotate(&result, angle);
        }

        if self.config.zoom_range > 0.0 {
            let factor = 1.0 + rng.gen_range(-self.config.zoom_range..=self.config.zoom_range);
            result = self.zoom(&result, factor);
        }

        if rng.gen::<f32>() < self.config.horizontal_flip_prob {
            result = result.fliph();
        }

        result
    }

    /// Rotate around the image center by `angle` degrees with bilinear
    /// sampling; uncovered corners are filled black.
    fn rotate(&self, img: &DynamicImage, angle: f32) -> DynamicImage {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let radians = angle.to_radians();
        let (sin, cos) = radians.sin_cos();
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;

        let mut output: RgbImage = ImageBuffer::new(width, height);

        for y in 0..height {
            for x in 0..width {
                // Inverse mapping: where in the source does this output
                // pixel come from?
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let src_x = cos * dx + sin * dy + cx;
                let src_y = -sin * dx + cos * dy + cy;

                output.put_pixel(x, y, self.bilinear_sample(&rgb, src_x, src_y));
            }
        }

        DynamicImage::ImageRgb8(output)
    }

    /// Scale about the image center by `factor`, keeping the frame size.
    /// Factors above 1.0 zoom in; below 1.0 zoom out with black borders.
    fn zoom(&self, img: &DynamicImage, factor: f32) -> DynamicImage {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;

        let mut output: RgbImage = ImageBuffer::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let src_x = (x as f32 - cx) / factor + cx;
                let src_y = (y as f32 - cy) / factor + cy;

                output.put_pixel(x, y, self.bilinear_sample(&rgb, src_x, src_y));
            }
        }

        DynamicImage::ImageRgb8(output)
    }

    /// Sample a pixel using bilinear interpolation; black outside the frame
    fn bilinear_sample(&self, img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
        let (width, height) = img.dimensions();

        if x < 0.0 || y < 0.0 || x >= width as f32 - 1.0 || y >= height as f32 - 1.0 {
            return Rgb([0, 0, 0]);
        }

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);

        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let p00 = img.get_pixel(x0, y0);
        let p10 = img.get_pixel(x1, y0);
        let p01 = img.get_pixel(x0, y1);
        let p11 = img.get_pixel(x1, y1);

        let mut result = [0u8; 3];
        for c in 0..3 {
            let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
                + p10[c] as f32 * fx * (1.0 - fy)
                + p01[c] as f32 * (1.0 - fx) * fy
                + p11[c] as f32 * fx * fy;

            result[c] = v.round().clamp(0.0, 255.0) as u8;
        }

        Rgb(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn gray_image(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            width,
            height,
            Rgb([value, value, value]),
        ))
    }

    #[test]
    fn test_augment_preserves_dimensions() {
        let augmenter = Augmenter::with_defaults();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let img = gray_image(64, 48, 128);
        let out = augmenter.augment(img, &mut rng);

        assert_eq!(out.width(), 64);
        assert_eq!(out.height(), 48);
    }

    #[test]
    fn test_no_augmentation_is_identity() {
        let augmenter = Augmenter::new(AugmentationConfig::none());
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let img = gray_image(8, 8, 200);
        let out = augmenter.augment(img.clone(), &mut rng).to_rgb8();

        assert_eq!(out, img.to_rgb8());
    }

    #[test]
    fn test_zoom_out_fills_corners_black() {
        let augmenter = Augmenter::with_defaults();

        let img = gray_image(32, 32, 255);
        let out = augmenter.zoom(&img, 0.5).to_rgb8();

        // At half scale the source occupies the central quarter only
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(16, 16), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_rotation_keeps_center() {
        let augmenter = Augmenter::with_defaults();

        let img = gray_image(33, 33, 180);
        let out = augmenter.rotate(&img, 15.0).to_rgb8();

        // The center pixel is a fixed point of the rotation
        assert_eq!(*out.get_pixel(16, 16), Rgb([180, 180, 180]));
    }

    #[test]
    fn test_augment_is_deterministic_for_a_seed() {
        let augmenter = Augmenter::with_defaults();
        let img = gray_image(16, 16, 90);

        let mut rng_a = ChaCha8Rng::seed_from_u64(11);
        let mut rng_b = ChaCha8Rng::seed_from_u64(11);

        let out_a = augmenter.augment(img.clone(), &mut rng_a).to_rgb8();
        let out_b = augmenter.augment(img, &mut rng_b).to_rgb8();

        assert_eq!(out_a, out_b);
    }
}
