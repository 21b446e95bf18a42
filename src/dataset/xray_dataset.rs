//! Burn dataset and batcher for chest X-ray studies.
//!
//! Items carry decoded pixel buffers in CHW layout, already rescaled to
//! `[0, 1]`. The training dataset augments on the fly at `get` time so every
//! epoch sees a fresh random variant of each study; validation and test
//! datasets decode deterministically.

use std::sync::atomic::{AtomicU64, Ordering};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::FilterType;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::dataset::augmentation::Augmenter;
use crate::dataset::manifest::ManifestEntry;
use crate::utils::error::{Error, Result};

/// One decoded study: a pixel buffer and its per-finding targets
#[derive(Debug, Clone)]
pub struct XrayItem {
    /// Image pixels in CHW layout, rescaled to `[0, 1]`
    pub image: Vec<f32>,
    /// Binary targets, one per finding
    pub labels: Vec<f32>,
    /// Image height in pixels
    pub height: usize,
    /// Image width in pixels
    pub width: usize,
}

impl XrayItem {
    /// Decode a manifest entry into a training item.
    ///
    /// The image is augmented (when an augmenter and rng are given), resized
    /// to `(height, width)` with bilinear filtering, converted to RGB, and
    /// rescaled by 1/255.
    pub fn from_entry(
        entry: &ManifestEntry,
        image_size: (usize, usize),
        augmenter: Option<(&Augmenter, &mut ChaCha8Rng)>,
    ) -> Result<Self> {
        let (height, width) = image_size;

        let mut img = image::open(&entry.path).map_err(|e| {
            Error::Image(format!("Failed to open {}: {}", entry.path.display(), e))
        })?;

        if let Some((augmenter, rng)) = augmenter {
            img = augmenter.augment(img, rng);
        }

        let resized = img
            .resize_exact(width as u32, height as u32, FilterType::Triangle)
            .to_rgb8();

        // HWC u8 -> CHW f32 in [0, 1]
        let mut pixels = vec![0.0f32; 3 * height * width];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                pixels[c * height * width + y * width + x] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(Self {
            image: pixels,
            labels: entry.labels.clone(),
            height,
            width,
        })
    }
}

/// Dataset over one manifest split
pub struct XrayDataset {
    entries: Vec<ManifestEntry>,
    image_size: (usize, usize),
    augmenter: Option<Augmenter>,
    seed: u64,
    access_counter: AtomicU64,
}

impl XrayDataset {
    /// Training dataset: augments each item on access
    pub fn training(entries: Vec<ManifestEntry>, image_size: (usize, usize), seed: u64) -> Self {
        Self {
            entries,
            image_size,
            augmenter: Some(Augmenter::with_defaults()),
            seed,
            access_counter: AtomicU64::new(0),
        }
    }

    /// Evaluation dataset: deterministic decode, no augmentation
    pub fn evaluation(entries: Vec<ManifestEntry>, image_size: (usize, usize)) -> Self {
        Self {
            entries,
            image_size,
            augmenter: None,
            seed: 0,
            access_counter: AtomicU64::new(0),
        }
    }

    /// Manifest entry backing a given index
    pub fn entry(&self, index: usize) -> Option<&ManifestEntry> {
        self.entries.get(index)
    }
}

impl Dataset<XrayItem> for XrayDataset {
    fn get(&self, index: usize) -> Option<XrayItem> {
        let entry = self.entries.get(index)?;

        let result = match &self.augmenter {
            Some(augmenter) => {
                // Mix a per-access nonce into the seed so repeated epochs see
                // different variants of the same study.
                let nonce = self.access_counter.fetch_add(1, Ordering::Relaxed);
                let mut rng = ChaCha8Rng::seed_from_u64(
                    self.seed
                        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
                        .wrapping_add(index as u64)
                        .wrapping_add(nonce << 32),
                );
                XrayItem::from_entry(entry, self.image_size, Some((augmenter, &mut rng)))
            }
            None => XrayItem::from_entry(entry, self.image_size, None),
        };

        match result {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping unreadable image {}: {}", entry.path.display(), e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A batch of studies ready for the model
#[derive(Debug, Clone)]
pub struct XrayBatch<B: Backend> {
    /// Input images, shape `[batch, 3, height, width]`
    pub images: Tensor<B, 4>,
    /// Binary targets, shape `[batch, num_classes]`
    pub targets: Tensor<B, 2>,
}

impl<B: Backend> XrayBatch<B> {
    /// Split the target matrix into one `[batch, 1]` column per head,
    /// matching the model's per-head outputs.
    pub fn targets_per_head(&self) -> Vec<Tensor<B, 2>> {
        let [batch, num_classes] = self.targets.dims();

        (0..num_classes)
            .map(|class| self.targets.clone().slice([0..batch, class..class + 1]))
            .collect()
    }
}

/// Collates decoded items into tensors on the requested device
#[derive(Clone, Debug, Default)]
pub struct XrayBatcher;

impl XrayBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, XrayItem, XrayBatch<B>> for XrayBatcher {
    fn batch(&self, items: Vec<XrayItem>, device: &B::Device) -> XrayBatch<B> {
        let batch = items.len();
        let (height, width) = (items[0].height, items[0].width);
        let num_classes = items[0].labels.len();

        let mut pixels = Vec::with_capacity(batch * 3 * height * width);
        let mut labels = Vec::with_capacity(batch * num_classes);
        for item in &items {
            pixels.extend_from_slice(&item.image);
            labels.extend_from_slice(&item.labels);
        }

        let images = Tensor::from_data(
            TensorData::new(pixels, [batch, 3, height, width]),
            device,
        );
        let targets = Tensor::from_data(TensorData::new(labels, [batch, num_classes]), device);

        XrayBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    type TestBackend = burn::backend::NdArray<f32>;

    fn item(labels: Vec<f32>) -> XrayItem {
        XrayItem {
            image: vec![0.5; 3 * 4 * 4],
            labels,
            height: 4,
            width: 4,
        }
    }

    #[test]
    fn test_batch_shapes() {
        let batcher = XrayBatcher::new();
        let device = Default::default();

        let items = vec![item(vec![0.0; 14]), item(vec![1.0; 14])];
        let batch: XrayBatch<TestBackend> = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.targets.dims(), [2, 14]);
    }

    #[test]
    fn test_targets_split_into_one_column_per_head() {
        let batcher = XrayBatcher::new();
        let device = Default::default();

        let mut labels_a = vec![0.0; 14];
        labels_a[3] = 1.0;
        let mut labels_b = vec![0.0; 14];
        labels_b[0] = 1.0;

        let items = vec![item(labels_a), item(labels_b)];
        let batch: XrayBatch<TestBackend> = batcher.batch(items, &device);

        let heads = batch.targets_per_head();
        assert_eq!(heads.len(), 14);

        for (class, head) in heads.iter().enumerate() {
            assert_eq!(head.dims(), [2, 1]);

            let values = head.to_data().to_vec::<f32>().unwrap();
            assert_eq!(values[0], if class == 3 { 1.0 } else { 0.0 });
            assert_eq!(values[1], if class == 0 { 1.0 } else { 0.0 });
        }
    }

    #[test]
    fn test_dataset_get_out_of_range() {
        let dataset = XrayDataset::evaluation(Vec::new(), (8, 8));
        assert_eq!(dataset.len(), 0);
        assert!(dataset.get(0).is_none());
    }

    #[test]
    fn test_dataset_get_unreadable_image() {
        let entries = vec![ManifestEntry {
            path: PathBuf::from("/nonexistent/image.jpg"),
            labels: vec![0.0; 14],
        }];
        let dataset = XrayDataset::evaluation(entries, (8, 8));

        assert_eq!(dataset.len(), 1);
        assert!(dataset.get(0).is_none());
    }

    #[test]
    fn test_item_from_entry_decodes_and_rescales() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.png");

        let img = image::RgbImage::from_pixel(10, 6, image::Rgb([255, 0, 128]));
        img.save(&path).unwrap();

        let entry = ManifestEntry {
            path,
            labels: vec![1.0; 14],
        };
        let item = XrayItem::from_entry(&entry, (8, 8), None).unwrap();

        assert_eq!(item.image.len(), 3 * 8 * 8);
        assert_eq!(item.height, 8);
        assert_eq!(item.width, 8);
        // Channel planes hold the rescaled constants
        assert!((item.image[0] - 1.0).abs() < 1e-3);
        assert!(item.image[8 * 8].abs() < 1e-3);
        assert!((item.image[2 * 8 * 8] - 128.0 / 255.0).abs() < 1e-2);
    }
}
