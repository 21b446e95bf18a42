//! Manifest Loading
//!
//! A manifest is a CSV file with a `path` column and one binary column per
//! finding. Three manifests describe the dataset splits: `train.csv`,
//! `valid.csv`, and `test.csv`, all living under the configured metadata
//! directory. Image paths in the manifests are relative and are rewritten
//! onto the configured image base directory at load time, so everything
//! downstream only ever sees absolute paths.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::RunConfig;
use crate::dataset::LABELS;
use crate::utils::error::{Error, Result};

/// A single manifest row: an image path and one target per finding
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    /// Absolute path to the image file
    pub path: PathBuf,
    /// Binary targets, one per finding in `LABELS` order
    pub labels: Vec<f32>,
}

/// An in-memory dataset manifest for one split
#[derive(Debug, Clone)]
pub struct Manifest {
    /// All rows of the manifest, in file order
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Load a manifest from a CSV file, rewriting relative image paths onto
    /// `image_base`.
    ///
    /// The header must contain a `path` column and every finding column;
    /// a missing column is a hard error. Empty label cells read as 0.0.
    pub fn from_csv(csv_path: &Path, image_base: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(csv_path).map_err(|e| {
            Error::Manifest(format!("Failed to open {}: {}", csv_path.display(), e))
        })?;

        let headers = reader.headers()?.clone();

        let path_idx = headers
            .iter()
            .position(|h| h == "path")
            .ok_or_else(|| {
                Error::Manifest(format!("{}: missing 'path' column", csv_path.display()))
            })?;

        let label_indices: Vec<usize> = LABELS
            .iter()
            .map(|label| {
                headers.iter().position(|h| h == *label).ok_or_else(|| {
                    Error::Manifest(format!(
                        "{}: missing label column '{}'",
                        csv_path.display(),
                        label
                    ))
                })
            })
            .collect::<Result<_>>()?;

        let mut entries = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record?;

            let relative = record.get(path_idx).ok_or_else(|| {
                Error::Manifest(format!("{}: row {} has no path", csv_path.display(), row))
            })?;

            let labels: Vec<f32> = label_indices
                .iter()
                .map(|&idx| parse_label(record.get(idx).unwrap_or("")))
                .collect::<Result<_>>()
                .map_err(|e| {
                    Error::Manifest(format!("{}: row {}: {}", csv_path.display(), row, e))
                })?;

            entries.push(ManifestEntry {
                path: image_base.join(relative),
                labels,
            });
        }

        Ok(Self { entries })
    }

    /// Number of rows in the manifest
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the manifest is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positive rate per finding, for dataset sanity logging
    pub fn prevalence(&self) -> Vec<f64> {
        if self.entries.is_empty() {
            return vec![0.0; LABELS.len()];
        }

        let mut counts = vec![0usize; LABELS.len()];
        for entry in &self.entries {
            for (i, &label) in entry.labels.iter().enumerate() {
                if label >= 0.5 {
                    counts[i] += 1;
                }
            }
        }

        counts
            .iter()
            .map(|&c| c as f64 / self.entries.len() as f64)
            .collect()
    }
}

/// Empty cells read as negative; anything else must parse as a float
fn parse_label(cell: &str) -> Result<f32> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(0.0);
    }

    cell.parse::<f32>()
        .map_err(|_| Error::Manifest(format!("invalid label value '{}'", cell)))
}

/// Load the train, validation, and test manifests named by the configuration
pub fn load_manifests(config: &RunConfig) -> Result<(Manifest, Manifest, Manifest)> {
    let base = &config.meta_base_path;

    let train = Manifest::from_csv(&base.join("train.csv"), &config.image_base_path)?;
    let valid = Manifest::from_csv(&base.join("valid.csv"), &config.image_base_path)?;
    let test = Manifest::from_csv(&base.join("test.csv"), &config.image_base_path)?;

    info!(
        "Loaded manifests: {} train / {} valid / {} test rows",
        train.len(),
        valid.len(),
        test.len()
    );

    Ok((train, valid, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::label_index;

    fn write_manifest(dir: &Path, name: &str, rows: &[(&str, [f32; 14])]) -> PathBuf {
        let mut csv = String::from("path");
        for label in LABELS {
            csv.push(',');
            // Quote names containing spaces the way upstream tooling does
            if label.contains(' ') {
                csv.push('"');
                csv.push_str(label);
                csv.push('"');
            } else {
                csv.push_str(label);
            }
        }
        csv.push('\n');

        for (path, labels) in rows {
            csv.push_str(path);
            for value in labels {
                csv.push_str(&format!(",{}", value));
            }
            csv.push('\n');
        }

        let path = dir.join(name);
        std::fs::write(&path, csv).unwrap();
        path
    }

    #[test]
    fn test_paths_rewritten_to_image_base() {
        let dir = tempfile::tempdir().unwrap();
        let mut labels = [0.0f32; 14];
        labels[1] = 1.0;
        let csv_path = write_manifest(
            dir.path(),
            "train.csv",
            &[("patient1/study1/view1.jpg", labels)],
        );

        let manifest = Manifest::from_csv(&csv_path, Path::new("/data/images")).unwrap();

        assert_eq!(manifest.len(), 1);
        // Every row must be rooted at the configured base directory
        for entry in &manifest.entries {
            assert!(entry.path.starts_with("/data/images"));
            assert!(entry.path.is_absolute());
        }
        assert_eq!(
            manifest.entries[0].path,
            PathBuf::from("/data/images/patient1/study1/view1.jpg")
        );
    }

    #[test]
    fn test_labels_read_in_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut labels = [0.0f32; 14];
        labels[label_index("Pneumonia").unwrap()] = 1.0;
        labels[label_index("No Finding").unwrap()] = 0.0;
        let csv_path = write_manifest(dir.path(), "valid.csv", &[("a.jpg", labels)]);

        let manifest = Manifest::from_csv(&csv_path, Path::new("/base")).unwrap();

        assert_eq!(manifest.entries[0].labels.len(), 14);
        assert_eq!(
            manifest.entries[0].labels[label_index("Pneumonia").unwrap()],
            1.0
        );
        assert_eq!(
            manifest.entries[0].labels[label_index("Atelectasis").unwrap()],
            0.0
        );
    }

    #[test]
    fn test_missing_label_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "path,Atelectasis\na.jpg,1\n").unwrap();

        let result = Manifest::from_csv(&path, Path::new("/base"));
        assert!(matches!(result, Err(Error::Manifest(_))));
    }

    #[test]
    fn test_empty_cells_read_as_negative() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.csv");
        let mut csv = String::from("path");
        for label in LABELS {
            csv.push(',');
            csv.push('"');
            csv.push_str(label);
            csv.push('"');
        }
        // All label cells empty
        csv.push_str("\na.jpg");
        csv.push_str(&",".repeat(14));
        csv.push('\n');
        std::fs::write(&path, csv).unwrap();

        let manifest = Manifest::from_csv(&path, Path::new("/base")).unwrap();
        assert!(manifest.entries[0].labels.iter().all(|&l| l == 0.0));
    }

    #[test]
    fn test_prevalence() {
        let dir = tempfile::tempdir().unwrap();
        let mut pos = [0.0f32; 14];
        pos[0] = 1.0;
        let neg = [0.0f32; 14];
        let csv_path =
            write_manifest(dir.path(), "train.csv", &[("a.jpg", pos), ("b.jpg", neg)]);

        let manifest = Manifest::from_csv(&csv_path, Path::new("/base")).unwrap();
        let prevalence = manifest.prevalence();

        assert!((prevalence[0] - 0.5).abs() < 1e-9);
        assert_eq!(prevalence[1], 0.0);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Manifest::from_csv(Path::new("/nonexistent.csv"), Path::new("/base"));
        assert!(result.is_err());
    }
}
