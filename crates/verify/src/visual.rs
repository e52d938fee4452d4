//! Screenshot comparison against approved baselines

use std::path::{Path, PathBuf};

use image::{GenericImageView, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{VerifyError, VerifyResult};

/// Per-channel difference tolerated before a pixel counts as changed
const CHANNEL_TOLERANCE: i16 = 5;

/// Result of a visual comparison
#[derive(Debug, Clone)]
pub struct VisualDiff {
    /// Whether the images match (within threshold)
    pub matches: bool,

    /// Percentage of pixels that differ
    pub diff_percent: f64,

    pub diff_pixels: u64,
    pub total_pixels: u64,

    /// Path to the diff image (if generated)
    pub diff_image_path: Option<PathBuf>,

    pub actual_hash: String,
    pub baseline_hash: String,
}

/// Compares screenshots in the output directory with their baselines
pub struct VisualTester {
    baseline_dir: PathBuf,
    actual_dir: PathBuf,
    diff_dir: PathBuf,

    /// Default threshold (0.0 - 100.0 percent)
    threshold: f64,

    /// Copy the screenshot into place when no baseline exists yet
    auto_update: bool,
}

impl VisualTester {
    pub fn new(config: VisualConfig) -> VerifyResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;

        Ok(Self {
            baseline_dir: config.baseline_dir,
            actual_dir: config.actual_dir,
            diff_dir: config.diff_dir,
            threshold: config.threshold,
            auto_update: config.auto_update,
        })
    }

    fn actual_path(&self, name: &str) -> PathBuf {
        self.actual_dir.join(format!("{}.png", name))
    }

    fn baseline_path(&self, name: &str) -> PathBuf {
        self.baseline_dir.join(format!("{}.png", name))
    }

    /// Compare a screenshot against its baseline
    pub fn compare(&self, name: &str, threshold: Option<f64>) -> VerifyResult<VisualDiff> {
        let threshold = threshold.unwrap_or(self.threshold);
        let actual_path = self.actual_path(name);
        let baseline_path = self.baseline_path(name);

        if !actual_path.exists() {
            return Err(VerifyError::VisualRegression(format!(
                "screenshot not found: {}",
                actual_path.display()
            )));
        }

        if !baseline_path.exists() {
            if !self.auto_update {
                return Err(VerifyError::BaselineNotFound(baseline_path));
            }
            info!("Creating baseline for '{}'", name);
            std::fs::copy(&actual_path, &baseline_path)?;
            let hash = hash_file(&actual_path)?;
            return Ok(VisualDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: 0,
                diff_image_path: None,
                actual_hash: hash.clone(),
                baseline_hash: hash,
            });
        }

        let actual_hash = hash_file(&actual_path)?;
        let baseline_hash = hash_file(&baseline_path)?;
        let actual = image::open(&actual_path)?;

        if actual_hash == baseline_hash {
            debug!("'{}' is byte-identical to its baseline", name);
            let (w, h) = actual.dimensions();
            return Ok(VisualDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: u64::from(w) * u64::from(h),
                diff_image_path: None,
                actual_hash,
                baseline_hash,
            });
        }

        let baseline = image::open(&baseline_path)?;
        if actual.dimensions() != baseline.dimensions() {
            warn!(
                "'{}' dimensions differ: actual {:?} vs baseline {:?}",
                name,
                actual.dimensions(),
                baseline.dimensions()
            );
        }

        let (diff_img, diff_pixels, total_pixels) =
            diff_images(&actual.to_rgba8(), &baseline.to_rgba8());
        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            diff_pixels as f64 / total_pixels as f64 * 100.0
        };
        let matches = diff_percent <= threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.diff_dir.join(format!("{}-diff.png", name));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                name, diff_percent, threshold
            );
        }

        Ok(VisualDiff {
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
            actual_hash,
            baseline_hash,
        })
    }

    /// Replace the baseline with the current screenshot
    pub fn update_baseline(&self, name: &str) -> VerifyResult<()> {
        let actual_path = self.actual_path(name);
        if !actual_path.exists() {
            return Err(VerifyError::VisualRegression(format!(
                "cannot update baseline, screenshot not found: {}",
                actual_path.display()
            )));
        }

        std::fs::copy(&actual_path, self.baseline_path(name))?;
        info!("Updated baseline for '{}'", name);
        Ok(())
    }

    pub fn list_baselines(&self) -> VerifyResult<Vec<String>> {
        let mut baselines = Vec::new();
        for entry in std::fs::read_dir(&self.baseline_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(name) = path.file_stem() {
                    baselines.push(name.to_string_lossy().to_string());
                }
            }
        }
        baselines.sort();
        Ok(baselines)
    }

    /// Remove diff images left by earlier runs
    pub fn clean_diffs(&self) -> VerifyResult<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.diff_dir)? {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Diff two images over the union of their areas. Pixels outside either
/// image count as different.
fn diff_images(actual: &RgbaImage, baseline: &RgbaImage) -> (RgbaImage, u64, u64) {
    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());
    let mut diff = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let a = pixel_at(actual, x, y);
            let b = pixel_at(baseline, x, y);
            match (a, b) {
                (Some(a), Some(b)) if !pixels_differ(a, b) => {
                    diff.put_pixel(x, y, Rgba([a[0] / 2, a[1] / 2, a[2] / 2, 128]));
                }
                _ => {
                    diff_pixels += 1;
                    diff.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                }
            }
        }
    }

    (diff, diff_pixels, u64::from(width) * u64::from(height))
}

fn pixel_at(img: &RgbaImage, x: u32, y: u32) -> Option<&Rgba<u8>> {
    (x < img.width() && y < img.height()).then(|| img.get_pixel(x, y))
}

fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    a.0.iter()
        .zip(b.0.iter())
        .any(|(x, y)| (i16::from(*x) - i16::from(*y)).abs() > CHANNEL_TOLERANCE)
}

fn hash_file(path: &Path) -> VerifyResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Configuration for visual testing
#[derive(Debug, Clone)]
pub struct VisualConfig {
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub diff_dir: PathBuf,
    pub threshold: f64,
    pub auto_update: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("verification/baselines"),
            actual_dir: PathBuf::from("verification"),
            diff_dir: PathBuf::from("verification/diffs"),
            threshold: 0.5,
            auto_update: false,
        }
    }
}
