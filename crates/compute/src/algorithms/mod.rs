//! Numerical building blocks for the per-sensor pipeline.
//!
//! - [`kmeans`]: seeded batch K-means (HMM initialisation)
//! - [`hmm`]: diagonal Gaussian HMM, Baum-Welch + Viterbi
//! - [`spectrum`]: real FFT (`realfft`) and band energies
//! - [`forest`]: CART random forest
//! - [`stats`]: descriptive statistics

pub mod forest;
pub mod hmm;
pub mod kmeans;
pub mod spectrum;
pub mod stats;
