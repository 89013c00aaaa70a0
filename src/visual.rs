//! Screenshot baselines for the playground scenarios

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, Rgba, RgbaImage};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

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

    /// SHA-256 of the actual PNG
    pub actual_hash: String,

    /// SHA-256 of the baseline PNG
    pub baseline_hash: String,
}

/// Configuration for visual testing
#[derive(Debug, Clone)]
pub struct VisualConfig {
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub diff_dir: PathBuf,
    /// Allowed share of differing pixels, in percent
    pub threshold: f64,
    /// Per-channel difference still counted as equal (anti-aliasing)
    pub tolerance: u8,
    /// Write the actual screenshot as the new baseline instead of comparing
    pub update: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("tests/goldens/expected"),
            actual_dir: PathBuf::from("target/visual/actual"),
            diff_dir: PathBuf::from("target/visual/diff"),
            threshold: 0.5,
            tolerance: 5,
            update: std::env::var("UPDATE_GOLDENS").is_ok(),
        }
    }
}

/// Compares PNG screenshots against stored baselines
pub struct VisualTester {
    config: VisualConfig,
}

impl VisualTester {
    pub fn new(config: VisualConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.actual_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;
        Ok(Self { config })
    }

    pub fn baseline_path(&self, name: &str) -> PathBuf {
        self.config.baseline_dir.join(name)
    }

    /// Compare `png` against the baseline called `name` (e.g.
    /// `helloWorldPlaygroundProject.png`).
    ///
    /// The actual screenshot is always written to the actual directory. In
    /// update mode the baseline is (re)written and the comparison trivially
    /// matches.
    pub fn compare(&self, name: &str, png: &[u8]) -> Result<VisualDiff> {
        let actual_path = self.config.actual_dir.join(name);
        std::fs::write(&actual_path, png)?;
        let actual_hash = hash_bytes(png);

        let baseline_path = self.baseline_path(name);
        if self.config.update {
            std::fs::write(&baseline_path, png)?;
            info!("Updated baseline {}", baseline_path.display());
            return Ok(VisualDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: 0,
                diff_image_path: None,
                actual_hash: actual_hash.clone(),
                baseline_hash: actual_hash,
            });
        }

        if !baseline_path.exists() {
            return Err(Error::BaselineNotFound(baseline_path.display().to_string()));
        }

        let baseline_png = std::fs::read(&baseline_path)?;
        let baseline_hash = hash_bytes(&baseline_png);

        let actual_img = image::load_from_memory(png)?;
        let total_pixels = u64::from(actual_img.width()) * u64::from(actual_img.height());

        if actual_hash == baseline_hash {
            debug!("{} matches its baseline byte for byte", name);
            return Ok(VisualDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels,
                diff_image_path: None,
                actual_hash,
                baseline_hash,
            });
        }

        let baseline_img = image::load_from_memory(&baseline_png)?;
        if actual_img.dimensions() != baseline_img.dimensions() {
            warn!(
                "Screenshot dimensions differ: actual {:?} vs baseline {:?}",
                actual_img.dimensions(),
                baseline_img.dimensions()
            );
        }

        let (diff_pixels, total_pixels, diff_img) = diff_images(
            &actual_img.to_rgba8(),
            &baseline_img.to_rgba8(),
            self.config.tolerance,
        );
        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            diff_pixels as f64 / total_pixels as f64 * 100.0
        };
        let matches = diff_percent <= self.config.threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.config.diff_dir.join(diff_name(name));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                name, diff_percent, self.config.threshold
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

    /// Like [`compare`](Self::compare), but a mismatch is an error.
    pub fn assert_matches(&self, name: &str, png: &[u8]) -> Result<VisualDiff> {
        let diff = self.compare(name, png)?;
        if diff.matches {
            Ok(diff)
        } else {
            Err(Error::VisualRegression {
                name: name.to_string(),
                diff_percent: diff.diff_percent,
                threshold: self.config.threshold,
            })
        }
    }
}

/// Count pixels that differ by more than `tolerance` on any channel.
///
/// Images of different sizes are compared over the union of both areas;
/// pixels outside the overlap count as different. Returns the differing
/// count, the total and a diff image with differences in red.
pub fn diff_images(actual: &RgbaImage, baseline: &RgbaImage, tolerance: u8) -> (u64, u64, RgbaImage) {
    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());
    let mut diff_img = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let a = pixel_at(actual, x, y);
            let b = pixel_at(baseline, x, y);
            match (a, b) {
                (Some(a), Some(b)) if !pixels_differ(a, b, tolerance) => {
                    let c = a.channels();
                    diff_img.put_pixel(x, y, Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                }
                _ => {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                }
            }
        }
    }

    (diff_pixels, u64::from(width) * u64::from(height), diff_img)
}

fn pixel_at(img: &RgbaImage, x: u32, y: u32) -> Option<&Rgba<u8>> {
    (x < img.width() && y < img.height()).then(|| img.get_pixel(x, y))
}

fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>, tolerance: u8) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| x.abs_diff(*y) > tolerance)
}

fn diff_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    format!("{}-diff.png", stem)
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
