use image::RgbImage;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::core::types::{AffectedArea, Diagnosis};
use crate::services::catalog::DiseaseCatalog;

/// Probability that the placeholder analyzer reports a disease
const DISEASE_PROBABILITY: f64 = 0.7;

/// Affected area side lengths, before clamping to the image
const MIN_AREA_SIDE: u32 = 50;
const MAX_AREA_SIDE: u32 = 100;

/// Seam between the image pipeline and whatever classifies the leaf.
///
/// A trained model plugs in here without any change to the pipeline:
/// it receives the RGB analysis copy and reports a catalog id, a confidence
/// percentage and rectangles in the analysis copy's coordinates.
pub trait DiseaseAnalyzer: Send + Sync {
    fn analyze(&self, image: &RgbImage) -> Diagnosis;

    fn name(&self) -> &'static str;
}

/// Placeholder analyzer producing random diagnoses.
///
/// 70% of calls report a random catalog disease with confidence in [70, 95)
/// and 2-6 rectangles; the rest report a healthy plant with confidence in
/// [80, 98) and no rectangles.
pub struct RandomAnalyzer {
    rng: Mutex<StdRng>,
    disease_ids: Vec<u32>,
    healthy_id: u32,
}

impl RandomAnalyzer {
    pub fn new(catalog: &DiseaseCatalog) -> Self {
        Self::with_rng(catalog, StdRng::from_entropy())
    }

    /// Deterministic analyzer for tests and reproducible runs
    pub fn with_seed(catalog: &DiseaseCatalog, seed: u64) -> Self {
        Self::with_rng(catalog, StdRng::seed_from_u64(seed))
    }

    fn with_rng(catalog: &DiseaseCatalog, rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            disease_ids: catalog.disease_ids(),
            healthy_id: catalog.healthy_id(),
        }
    }
}

impl DiseaseAnalyzer for RandomAnalyzer {
    fn analyze(&self, image: &RgbImage) -> Diagnosis {
        let mut rng = self.rng.lock();

        if rng.gen_bool(DISEASE_PROBABILITY) {
            if let Some(&disease_id) = self.disease_ids.choose(&mut *rng) {
                let confidence = rng.gen_range(70.0f32..95.0);
                let affected_areas = random_areas(&mut *rng, image.width(), image.height());
                return Diagnosis {
                    disease_id,
                    confidence,
                    affected_areas,
                };
            }
        }

        Diagnosis {
            disease_id: self.healthy_id,
            confidence: rng.gen_range(80.0f32..98.0),
            affected_areas: Vec::new(),
        }
    }

    fn name(&self) -> &'static str {
        "random-placeholder"
    }
}

/// 2-6 rectangles fully inside a `width` x `height` image
fn random_areas<R: Rng>(rng: &mut R, width: u32, height: u32) -> Vec<AffectedArea> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let count = rng.gen_range(2..=6);
    (0..count)
        .map(|_| {
            let area_width = side_length(rng, width);
            let area_height = side_length(rng, height);
            AffectedArea {
                x: rng.gen_range(0..=width - area_width),
                y: rng.gen_range(0..=height - area_height),
                width: area_width,
                height: area_height,
            }
        })
        .collect()
}

fn side_length<R: Rng>(rng: &mut R, bound: u32) -> u32 {
    let max = bound.min(MAX_AREA_SIDE);
    let min = max.min(MIN_AREA_SIDE);
    rng.gen_range(min..=max)
}
