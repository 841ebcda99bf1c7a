//! Facial keypoint regression network.
//!
//! Predicts 68 ordered (x, y) facial landmarks (136 raw regression values)
//! from square grayscale images. The feature extractor is four stages of
//! 3x3 convolution, ReLU, 2x2 max-pooling and dropout with channel depth
//! doubling per stage, followed by a three-layer fully-connected head.

pub mod inference;
pub mod model;

#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Wgpu;

#[cfg(all(any(feature = "tch-cpu", feature = "tch-gpu"), not(feature = "wgpu")))]
pub type DefaultBackend = burn::backend::LibTorch;

#[cfg(all(
    feature = "ndarray",
    not(any(feature = "wgpu", feature = "tch-cpu", feature = "tch-gpu"))
))]
pub type DefaultBackend = burn::backend::NdArray;
