//! Batch gradient descent for logistic regression. The per-epoch gradient is
//! the fork-join part: leaves sum the gradient of their samples, combines add
//! the two vectors.

use crate::data::Samples;
use anyhow::ensure;
use forkpool::{ForkJoin, Task, TaskRange, ThreadPool};

pub const THRESHOLD: usize = 50;

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Probability that `x` belongs to class 1.
pub fn predict(weights: &[f64], x: &[f64]) -> f64 {
    sigmoid(weights.iter().zip(x).map(|(w, x)| w * x).sum())
}

/// Log-likelihood gradient of the current `weights` over a range of samples.
pub struct Gradient<'a> {
    samples: &'a Samples,
    weights: &'a [f64],
}

impl<'a> Gradient<'a> {
    /// # Panics
    ///
    /// Panics if `weights` does not have one entry per feature.
    #[track_caller]
    pub fn new(samples: &'a Samples, weights: &'a [f64]) -> Self {
        assert_eq!(
            samples.num_features,
            weights.len(),
            "expected one weight per feature"
        );
        Self { samples, weights }
    }

    fn over(&self, range: TaskRange) -> Vec<f64> {
        let mut gradient = vec![0.0; self.weights.len()];
        for i in range.as_range() {
            let x = self.samples.row(i);
            let error = self.samples.labels[i] - predict(self.weights, x);
            for (g, x) in gradient.iter_mut().zip(x) {
                *g += error * x;
            }
        }
        gradient
    }
}

impl ForkJoin for Gradient<'_> {
    type Part = TaskRange;
    type Output = Vec<f64>;

    fn compute_base(&self, part: TaskRange) -> anyhow::Result<Vec<f64>> {
        Ok(self.over(part))
    }

    fn combine(&self, mut left: Vec<f64>, right: Vec<f64>) -> anyhow::Result<Vec<f64>> {
        ensure!(
            left.len() == self.weights.len() && right.len() == self.weights.len(),
            "gradient shape mismatch: {} and {} entries for {} weights",
            left.len(),
            right.len(),
            self.weights.len()
        );
        for (l, r) in left.iter_mut().zip(right) {
            *l += r;
        }
        Ok(left)
    }
}

pub fn gradient_sequential(samples: &Samples, weights: &[f64]) -> Vec<f64> {
    Gradient::new(samples, weights).over(TaskRange::new(0, samples.len()))
}

pub fn gradient_parallel(
    pool: &ThreadPool,
    samples: &Samples,
    weights: &[f64],
) -> forkpool::Result<Vec<f64>> {
    let job = Gradient::new(samples, weights);
    pool.submit(Task::new(&job, TaskRange::new(0, samples.len()), THRESHOLD))
}

fn step(weights: &mut [f64], gradient: &[f64], learning_rate: f64, num_samples: usize) {
    for (w, g) in weights.iter_mut().zip(gradient) {
        *w += learning_rate * g / num_samples as f64;
    }
}

/// Trains from zero weights and returns the final weights.
pub fn train_sequential(samples: &Samples, learning_rate: f64, epochs: usize) -> Vec<f64> {
    let mut weights = vec![0.0; samples.num_features];
    if samples.is_empty() {
        return weights;
    }

    for _ in 0..epochs {
        let gradient = gradient_sequential(samples, &weights);
        step(&mut weights, &gradient, learning_rate, samples.len());
    }
    weights
}

/// Same as [`train_sequential`], each epoch's gradient is computed on `pool`.
pub fn train_parallel(
    pool: &ThreadPool,
    samples: &Samples,
    learning_rate: f64,
    epochs: usize,
) -> forkpool::Result<Vec<f64>> {
    let mut weights = vec![0.0; samples.num_features];
    if samples.is_empty() {
        return Ok(weights);
    }

    for _ in 0..epochs {
        let gradient = gradient_parallel(pool, samples, &weights)?;
        step(&mut weights, &gradient, learning_rate, samples.len());
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data;
    use crate::workloads::{approx_eq, test_pool};

    fn tiny_set() -> Samples {
        let features = vec![
            0.5, 1.5, 1.5, 1.5, 0.5, -0.5, -1.5, 1.5, -0.5, -1.5, 1.5, -1.5, 1.1, 2.5, 2.5, 2.1,
            1.5, -0.1, -1.2, 2.1, -1.5, -2.5, 2.5, -1.0,
        ];
        let labels = vec![0., 0., 1., 0., 1., 1., 0., 0., 1., 0., 1., 1.];
        Samples {
            features,
            labels,
            num_features: 2,
        }
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_training_learns_tiny_set() -> anyhow::Result<()> {
        let set = tiny_set();
        let pool = test_pool(2)?;

        let weights = train_parallel(&pool, &set, 0.1, 1_000)?;
        assert!(predict(&weights, &[1.0, -1.0]) > 0.5);
        assert!(predict(&weights, &[-1.0, 2.0]) < 0.5);
        Ok(())
    }

    #[test]
    fn test_gradient_matches_sequential() -> anyhow::Result<()> {
        let set = data::samples(&mut fastrand::Rng::with_seed(2), 5_000, 6);
        let weights = vec![0.3, -0.2, 0.1, 0.0, 0.5, -0.4];
        let pool = test_pool(4)?;

        let par = gradient_parallel(&pool, &set, &weights)?;
        let seq = gradient_sequential(&set, &weights);
        assert!(approx_eq(&par, &seq, 1e-9), "{par:?} != {seq:?}");
        Ok(())
    }

    #[test]
    fn test_training_matches_sequential() -> anyhow::Result<()> {
        let set = data::samples(&mut fastrand::Rng::with_seed(3), 1_000, 4);
        let pool = test_pool(4)?;

        let par = train_parallel(&pool, &set, 0.05, 20)?;
        let seq = train_sequential(&set, 0.05, 20);
        assert!(approx_eq(&par, &seq, 1e-9), "{par:?} != {seq:?}");
        Ok(())
    }

    #[test]
    fn test_combine_rejects_shape_mismatch() {
        let set = tiny_set();
        let weights = [0.0, 0.0];
        let job = Gradient::new(&set, &weights);

        assert_eq!(job.combine(vec![1.0, 2.0], vec![0.5, 0.5]).unwrap(), vec![1.5, 2.5]);
        let err = job.combine(vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert!(err.to_string().contains("shape mismatch"), "{err}");
    }

    /// Drops the last entry of the gradient of the first leaf.
    struct Truncated<'a>(Gradient<'a>);

    impl ForkJoin for Truncated<'_> {
        type Part = TaskRange;
        type Output = Vec<f64>;

        fn compute_base(&self, part: TaskRange) -> anyhow::Result<Vec<f64>> {
            let mut gradient = self.0.over(part);
            if part.start == 0 {
                gradient.pop();
            }
            Ok(gradient)
        }

        fn combine(&self, left: Vec<f64>, right: Vec<f64>) -> anyhow::Result<Vec<f64>> {
            self.0.combine(left, right)
        }
    }

    #[test]
    fn test_shape_mismatch_fails_the_submission() -> anyhow::Result<()> {
        let set = tiny_set();
        let weights = [0.1, -0.1];
        let job = Truncated(Gradient::new(&set, &weights));
        let pool = test_pool(2)?;

        let res = pool.submit(Task::new(&job, TaskRange::new(0, set.len()), 4));
        assert!(
            matches!(res, Err(forkpool::Error::Combine { left, .. }) if left.start == 0),
            "{res:?}"
        );
        Ok(())
    }

    #[test]
    fn test_no_samples() -> anyhow::Result<()> {
        let set = Samples {
            features: vec![],
            labels: vec![],
            num_features: 3,
        };
        let pool = test_pool(1)?;
        assert_eq!(train_parallel(&pool, &set, 0.1, 5)?, vec![0.0; 3]);
        assert_eq!(gradient_parallel(&pool, &set, &[1.0, 1.0, 1.0])?, vec![0.0; 3]);
        Ok(())
    }
}
