//! Image-to-keypoints helpers around [KeypointNet::forward].
//!
//! Weight loading is a caller concern; these helpers run whatever
//! parameters the model currently holds.

use std::path::Path;

use burn::tensor::{backend::Backend, Shape, Tensor, TensorData};
use image::{imageops::FilterType, DynamicImage};

use crate::model::KeypointNet;

/// Predicted landmark coordinates for one image, in the pixel space of the
/// resized model input. Ordered as the 68-point annotation scheme orders
/// them.
pub type Keypoints = Vec<[f32; 2]>;

/// Loads an image from disk and predicts its facial keypoints.
///
/// Decoding errors propagate; everything after decoding follows the
/// model's own failure semantics.
pub fn predict<B: Backend>(
    model: &KeypointNet<B>,
    path: &Path,
    device: &B::Device,
) -> Result<Keypoints, image::ImageError> {
    let image = image::open(path)?;
    Ok(predict_image(model, image, device))
}

/// Predicts facial keypoints for an already decoded image.
///
/// The image is converted to grayscale, resized to the model's configured
/// input size and scaled to `[0, 1]` before the forward pass.
pub fn predict_image<B: Backend>(
    model: &KeypointNet<B>,
    image: DynamicImage,
    device: &B::Device,
) -> Keypoints {
    let size = model.input_size();
    let gray = image
        .resize_exact(size as u32, size as u32, FilterType::Triangle)
        .into_luma8();
    log::debug!("resized input image to {size}x{size} grayscale");

    let data = TensorData::new(gray.into_raw(), Shape::new([size, size]));
    let input = Tensor::<B, 2>::from_data(data.convert::<B::FloatElem>(), device)
        .reshape([1, 1, size, size])
        .div_scalar(255.0);

    keypoint_pairs(model.forward(input))
}

/// Decodes a single image's raw regression output into (x, y) pairs.
///
/// Expects a `[1, 2 * NUM_KEYPOINTS]` tensor; values are paired in order.
pub fn keypoint_pairs<B: Backend>(output: Tensor<B, 2>) -> Keypoints {
    let values = output
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .expect("regression output is a contiguous float buffer");

    values.chunks_exact(2).map(|pair| [pair[0], pair[1]]).collect()
}
