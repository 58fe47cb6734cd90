//! Seeded input generators. Same seed, same input, on every platform.

use fastrand::Rng;

/// Number of distinct class labels in [`points`].
pub const NUM_LABELS: usize = 10;

pub fn ints(rng: &mut Rng, len: usize) -> Vec<i32> {
    (0..len).map(|_| rng.i32(1..100_000_000)).collect()
}

/// Short lowercase words of 1 to 8 letters.
pub fn words(rng: &mut Rng, len: usize) -> Vec<String> {
    (0..len)
        .map(|_| {
            let n = rng.usize(1..=8);
            (0..n).map(|_| rng.lowercase()).collect()
        })
        .collect()
}

/// Row-major `n x n` matrix with small entries so products never overflow.
pub fn square_matrix(rng: &mut Rng, n: usize) -> Vec<i64> {
    (0..n * n).map(|_| rng.i64(-100..=100)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub label: u8,
}

impl Point {
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Labelled points spread over the `[0, 100) x [0, 100)` square.
pub fn points(rng: &mut Rng, len: usize) -> Vec<Point> {
    (0..len)
        .map(|_| Point {
            x: rng.f64() * 100.0,
            y: rng.f64() * 100.0,
            label: rng.u8(0..NUM_LABELS as u8),
        })
        .collect()
}

/// Binary classification data set, features stored row-major.
#[derive(Debug, Clone)]
pub struct Samples {
    pub features: Vec<f64>,
    pub labels: Vec<f64>,
    pub num_features: usize,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.features[i * self.num_features..(i + 1) * self.num_features]
    }
}

/// Samples labelled 1 when the sum of their features is negative, which keeps
/// the set linearly separable.
///
/// # Panics
///
/// Panics if `num_features` is 0.
#[track_caller]
pub fn samples(rng: &mut Rng, len: usize, num_features: usize) -> Samples {
    assert!(num_features > 0, "samples need at least one feature");

    let features = (0..len * num_features)
        .map(|_| rng.f64() * 4.0 - 2.0)
        .collect::<Vec<_>>();

    let labels = features
        .chunks_exact(num_features)
        .map(|row| if row.iter().sum::<f64>() < 0.0 { 1.0 } else { 0.0 })
        .collect();

    Samples {
        features,
        labels,
        num_features,
    }
}

pub type Rgb = [u8; 3];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Rgb>,
}

impl Image {
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 3]; width * height],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        self.pixels[y * self.width + x]
    }
}

pub fn image(rng: &mut Rng, width: usize, height: usize) -> Image {
    let pixels = (0..width * height)
        .map(|_| [rng.u8(..), rng.u8(..), rng.u8(..)])
        .collect();

    Image {
        width,
        height,
        pixels,
    }
}
