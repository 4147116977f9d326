//! Gaussian hidden Markov model with diagonal covariances.
//!
//! Trained with scaled Baum-Welch (forward-backward with per-step
//! normalization) and decoded with log-space Viterbi. Initial state means
//! come from a seeded K-means run so different seeds give different starts.

use std::f64::consts::PI;
use std::time::Instant;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::kmeans::kmeans;

/// Errors raised while fitting or evaluating an HMM.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HmmError {
    #[error("need at least {states} observations, got {observations}")]
    TooFewObservations { observations: usize, states: usize },
    #[error("likelihood became non-finite at iteration {iteration}")]
    NonFinite { iteration: usize },
    #[error("fit deadline reached after {iterations} iterations")]
    DeadlineExceeded { iterations: usize },
}

/// Stopping rules for [`GaussianHmm::fit`].
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative log-likelihood gain below which training stops.
    pub tolerance: f64,
    /// Lower bound on every per-dimension variance.
    pub variance_floor: f64,
    pub deadline: Option<Instant>,
}

/// Outcome of a Baum-Welch run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianHmm {
    n_states: usize,
    start: Vec<f64>,
    transitions: Vec<Vec<f64>>,
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
}

impl GaussianHmm {
    /// Initialise from a K-means clustering of the observations.
    ///
    /// Transitions start strongly self-persistent; each state's variance is
    /// the within-cluster variance (floored).
    pub fn init_from_kmeans(
        observations: &[Vec<f64>],
        n_states: usize,
        variance_floor: f64,
        rng: &mut StdRng,
    ) -> Result<Self, HmmError> {
        if n_states == 0 || observations.len() < n_states {
            return Err(HmmError::TooFewObservations {
                observations: observations.len(),
                states: n_states,
            });
        }
        let dim = observations[0].len();
        let clusters = kmeans(observations, n_states, 50, rng);

        let mut variances = vec![vec![0.0; dim]; n_states];
        let mut counts = vec![0usize; n_states];
        for (obs, &c) in observations.iter().zip(&clusters.assignments) {
            counts[c] += 1;
            for d in 0..dim {
                let diff = obs[d] - clusters.centroids[c][d];
                variances[c][d] += diff * diff;
            }
        }
        for (var, &count) in variances.iter_mut().zip(&counts) {
            for v in var.iter_mut() {
                *v = if count > 1 { *v / count as f64 } else { 1.0 };
                *v = v.max(variance_floor);
            }
        }

        let stay = if n_states == 1 { 1.0 } else { 0.9 };
        let leave = if n_states == 1 { 0.0 } else { 0.1 / (n_states - 1) as f64 };
        let transitions = (0..n_states)
            .map(|i| {
                (0..n_states)
                    .map(|j| if i == j { stay } else { leave })
                    .collect()
            })
            .collect();

        Ok(Self {
            n_states,
            start: vec![1.0 / n_states as f64; n_states],
            transitions,
            means: clusters.centroids,
            variances,
        })
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn means(&self) -> &[Vec<f64>] {
        &self.means
    }

    /// Per-state, per-step emission log densities.
    fn log_emissions(&self, observations: &[Vec<f64>]) -> Vec<Vec<f64>> {
        observations
            .iter()
            .map(|obs| {
                (0..self.n_states)
                    .map(|s| log_gaussian(obs, &self.means[s], &self.variances[s]))
                    .collect()
            })
            .collect()
    }

    /// Run Baum-Welch until the likelihood stabilises or a stopping rule fires.
    pub fn fit(
        &mut self,
        observations: &[Vec<f64>],
        options: &FitOptions,
    ) -> Result<FitSummary, HmmError> {
        let t_len = observations.len();
        let k = self.n_states;
        if t_len < k.max(2) {
            return Err(HmmError::TooFewObservations {
                observations: t_len,
                states: k,
            });
        }
        let dim = observations[0].len();

        let mut prev_ll = f64::NEG_INFINITY;
        let mut ll = f64::NEG_INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < options.max_iterations {
            if options.deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(HmmError::DeadlineExceeded { iterations });
            }
            iterations += 1;

            let pass = self.forward_backward(observations);
            ll = pass.log_likelihood;
            if !ll.is_finite() {
                return Err(HmmError::NonFinite { iteration: iterations });
            }

            // M-step: start distribution.
            self.start.clone_from(&pass.gamma[0]);

            // Transitions.
            for i in 0..k {
                let denom: f64 = pass.gamma[..t_len - 1].iter().map(|g| g[i]).sum();
                if denom <= f64::MIN_POSITIVE {
                    continue;
                }
                let row: Vec<f64> = pass.xi_sum[i].iter().map(|x| x / denom).collect();
                let total: f64 = row.iter().sum();
                if total > 0.0 {
                    self.transitions[i] = row.into_iter().map(|p| p / total).collect();
                }
            }

            // Emissions.
            for s in 0..k {
                let weight: f64 = pass.gamma.iter().map(|g| g[s]).sum();
                if weight <= 1e-10 {
                    continue;
                }
                let mut mean = vec![0.0; dim];
                for (obs, g) in observations.iter().zip(&pass.gamma) {
                    for d in 0..dim {
                        mean[d] += g[s] * obs[d];
                    }
                }
                for m in &mut mean {
                    *m /= weight;
                }
                let mut var = vec![0.0; dim];
                for (obs, g) in observations.iter().zip(&pass.gamma) {
                    for d in 0..dim {
                        let diff = obs[d] - mean[d];
                        var[d] += g[s] * diff * diff;
                    }
                }
                for v in &mut var {
                    *v = (*v / weight).max(options.variance_floor);
                }
                self.means[s] = mean;
                self.variances[s] = var;
            }

            if (ll - prev_ll).abs() <= options.tolerance * ll.abs().max(1.0) {
                converged = true;
                break;
            }
            prev_ll = ll;
        }

        Ok(FitSummary {
            log_likelihood: ll,
            iterations,
            converged,
        })
    }

    /// Total log-likelihood of the observations under the current parameters.
    pub fn log_likelihood(&self, observations: &[Vec<f64>]) -> f64 {
        if observations.is_empty() {
            return 0.0;
        }
        self.forward_backward(observations).log_likelihood
    }

    fn forward_backward(&self, observations: &[Vec<f64>]) -> ForwardBackward {
        let t_len = observations.len();
        let k = self.n_states;
        let log_b = self.log_emissions(observations);

        // Emission probabilities rescaled per step by their maximum; the
        // offsets are added back into the likelihood.
        let mut offset_sum = 0.0;
        let b: Vec<Vec<f64>> = log_b
            .iter()
            .map(|row| {
                let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                offset_sum += max;
                row.iter().map(|lb| (lb - max).exp()).collect()
            })
            .collect();

        let mut alpha = vec![vec![0.0; k]; t_len];
        let mut scale = vec![0.0; t_len];

        for s in 0..k {
            alpha[0][s] = self.start[s] * b[0][s];
        }
        scale[0] = normalize(&mut alpha[0]);

        for t in 1..t_len {
            for j in 0..k {
                let mut acc = 0.0;
                for i in 0..k {
                    acc += alpha[t - 1][i] * self.transitions[i][j];
                }
                alpha[t][j] = acc * b[t][j];
            }
            scale[t] = normalize(&mut alpha[t]);
        }

        let log_likelihood = scale.iter().map(|c| c.ln()).sum::<f64>() + offset_sum;

        let mut beta = vec![vec![1.0; k]; t_len];
        for t in (0..t_len - 1).rev() {
            for i in 0..k {
                let mut acc = 0.0;
                for j in 0..k {
                    acc += self.transitions[i][j] * b[t + 1][j] * beta[t + 1][j];
                }
                beta[t][i] = acc / scale[t + 1];
            }
        }

        let mut gamma = vec![vec![0.0; k]; t_len];
        for t in 0..t_len {
            for s in 0..k {
                gamma[t][s] = alpha[t][s] * beta[t][s];
            }
            normalize(&mut gamma[t]);
        }

        let mut xi_sum = vec![vec![0.0; k]; k];
        for t in 0..t_len - 1 {
            for i in 0..k {
                for j in 0..k {
                    xi_sum[i][j] += alpha[t][i] * self.transitions[i][j] * b[t + 1][j]
                        * beta[t + 1][j]
                        / scale[t + 1];
                }
            }
        }

        ForwardBackward {
            gamma,
            xi_sum,
            log_likelihood,
        }
    }

    /// Most likely state path (log-space Viterbi). Ties go to the lower state.
    pub fn viterbi(&self, observations: &[Vec<f64>]) -> Vec<usize> {
        let t_len = observations.len();
        if t_len == 0 {
            return Vec::new();
        }
        let k = self.n_states;
        let log_b = self.log_emissions(observations);
        let log_start: Vec<f64> = self.start.iter().map(|p| p.ln()).collect();
        let log_trans: Vec<Vec<f64>> = self
            .transitions
            .iter()
            .map(|row| row.iter().map(|p| p.ln()).collect())
            .collect();

        let mut delta: Vec<f64> = (0..k).map(|s| log_start[s] + log_b[0][s]).collect();
        let mut backptr = vec![vec![0usize; k]; t_len];

        for t in 1..t_len {
            let mut next = vec![f64::NEG_INFINITY; k];
            for j in 0..k {
                let mut best = f64::NEG_INFINITY;
                let mut arg = 0;
                for i in 0..k {
                    let score = delta[i] + log_trans[i][j];
                    if score > best {
                        best = score;
                        arg = i;
                    }
                }
                next[j] = best + log_b[t][j];
                backptr[t][j] = arg;
            }
            delta = next;
        }

        let mut state = 0;
        let mut best = f64::NEG_INFINITY;
        for (s, &d) in delta.iter().enumerate() {
            if d > best {
                best = d;
                state = s;
            }
        }

        let mut path = vec![0usize; t_len];
        path[t_len - 1] = state;
        for t in (1..t_len).rev() {
            state = backptr[t][state];
            path[t - 1] = state;
        }
        path
    }
}

struct ForwardBackward {
    gamma: Vec<Vec<f64>>,
    xi_sum: Vec<Vec<f64>>,
    log_likelihood: f64,
}

/// Normalize in place, returning the pre-normalization sum.
fn normalize(row: &mut [f64]) -> f64 {
    let total: f64 = row.iter().sum();
    if total > 0.0 {
        for v in row.iter_mut() {
            *v /= total;
        }
    }
    total
}

fn log_gaussian(x: &[f64], mean: &[f64], var: &[f64]) -> f64 {
    x.iter()
        .zip(mean)
        .zip(var)
        .map(|((x, m), v)| -0.5 * ((2.0 * PI * v).ln() + (x - m) * (x - m) / v))
        .sum()
}
