use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Number of predicted facial landmarks; each contributes an (x, y) pair.
pub const NUM_KEYPOINTS: usize = 68;

/// Channel progression across the four convolution stages.
const CHANNELS: [usize; 5] = [1, 32, 64, 128, 256];
/// Dropout probability per convolution stage.
const STAGE_DROPOUT: [f64; 4] = [0.1, 0.2, 0.3, 0.4];
/// Dropout probabilities after the first and second fully-connected layers.
const HEAD_DROPOUT: [f64; 2] = [0.5, 0.6];

/// One feature-extraction stage: 3x3 valid convolution, ReLU, 2x2
/// max-pooling with stride 2, then dropout.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    pool: MaxPool2d,
    dropout: Dropout,
    activation: Relu,
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    channels: [usize; 2],
    dropout: f64,
}

impl ConvBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        ConvBlock {
            conv: Conv2dConfig::new(self.channels, [3, 3]).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);
        self.dropout.forward(x)
    }
}

/// Regression network for facial keypoints.
///
/// Four [ConvBlock] stages with channel depth doubling from 32 to 256 feed
/// a three-layer fully-connected head that emits `2 * NUM_KEYPOINTS` raw
/// coordinates. No activation follows the last layer.
#[derive(Module, Debug)]
pub struct KeypointNet<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    dropout1: Dropout,
    dropout2: Dropout,
    input_size: usize,
}

/// Configuration to create a [KeypointNet] with [init](KeypointNetConfig::init).
#[derive(Config, Debug)]
pub struct KeypointNetConfig {
    /// Spatial size (height = width) of the grayscale input images.
    #[config(default = 224)]
    pub input_size: usize,
    /// Width of the two hidden fully-connected layers.
    #[config(default = 256)]
    pub hidden_size: usize,
}

impl KeypointNetConfig {
    /// Returns the initialized model.
    ///
    /// The flattened width of the head is derived from `input_size`, so
    /// resolutions other than the default 224 work without further
    /// configuration. Panics if `input_size` cannot survive four
    /// conv+pool stages.
    pub fn init<B: Backend>(&self, device: &B::Device) -> KeypointNet<B> {
        let pooled = pooled_size(self.input_size);
        let flattened = CHANNELS[CHANNELS.len() - 1] * pooled * pooled;

        let blocks = CHANNELS
            .windows(2)
            .zip(STAGE_DROPOUT)
            .map(|(pair, dropout)| ConvBlockConfig::new([pair[0], pair[1]], dropout).init(device))
            .collect();

        KeypointNet {
            blocks,
            fc1: LinearConfig::new(flattened, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            fc3: LinearConfig::new(self.hidden_size, 2 * NUM_KEYPOINTS).init(device),
            dropout1: DropoutConfig::new(HEAD_DROPOUT[0]).init(),
            dropout2: DropoutConfig::new(HEAD_DROPOUT[1]).init(),
            input_size: self.input_size,
        }
    }
}

/// Spatial size of the feature map after the four conv+pool stages.
///
/// Each stage loses 2 pixels to the valid 3x3 convolution and then halves
/// (floor) under 2x2 pooling. The default 224 input ends at 12, giving the
/// classic 256 * 12 * 12 = 36864 flattened width.
fn pooled_size(input_size: usize) -> usize {
    let mut size = input_size;
    for _ in 0..STAGE_DROPOUT.len() {
        assert!(
            size >= 4,
            "input_size {input_size} is too small for four conv+pool stages (minimum 46)"
        );
        size = (size - 2) / 2;
    }
    size
}

impl<B: Backend> KeypointNet<B> {
    /// Predicts keypoint coordinates for a batch of grayscale images.
    ///
    /// # Shapes
    ///   - images: `[batch_size, 1, input_size, input_size]`
    ///   - output: `[batch_size, 2 * NUM_KEYPOINTS]`
    ///
    /// Dropout only fires on a backend that records gradients; on a plain
    /// inference backend repeated calls are deterministic. Inputs whose
    /// channel count or spatial size disagree with the configuration panic
    /// inside the tensor ops, at the convolution or at the flatten-to-fc1
    /// boundary respectively.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in self.blocks.iter() {
            x = block.forward(x);
        }

        let x = x.flatten(1, 3);
        let x = self.fc1.forward(x);
        let x = self.dropout1.forward(x);
        let x = self.fc2.forward(x);
        let x = self.dropout2.forward(x);
        self.fc3.forward(x)
    }

    /// Spatial size the model was configured for.
    pub fn input_size(&self) -> usize {
        self.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn output_shape_is_two_per_keypoint() {
        let device = Default::default();
        let model = KeypointNetConfig::new().init::<TestBackend>(&device);
        let images =
            Tensor::<TestBackend, 4>::random([3, 1, 224, 224], Distribution::Default, &device);

        let output = model.forward(images);

        assert_eq!(output.dims(), [3, 2 * NUM_KEYPOINTS]);
    }

    #[test]
    fn default_config_matches_original_resolution() {
        assert_eq!(pooled_size(224), 12);
    }

    #[test]
    fn flattened_width_follows_input_size() {
        let device = Default::default();
        let model = KeypointNetConfig::new()
            .with_input_size(96)
            .init::<TestBackend>(&device);
        let images =
            Tensor::<TestBackend, 4>::random([2, 1, 96, 96], Distribution::Default, &device);

        let output = model.forward(images);

        assert_eq!(output.dims(), [2, 2 * NUM_KEYPOINTS]);
    }

    #[test]
    fn inference_forward_is_deterministic() {
        let device = Default::default();
        let model = KeypointNetConfig::new()
            .with_input_size(64)
            .init::<TestBackend>(&device);
        let images =
            Tensor::<TestBackend, 4>::random([1, 1, 64, 64], Distribution::Default, &device);

        let first = model.forward(images.clone()).into_data();
        let second = model.forward(images).into_data();

        first.assert_eq(&second, true);
    }

    #[test]
    fn training_forward_applies_dropout() {
        type TrainBackend = Autodiff<TestBackend>;

        let device = Default::default();
        let model = KeypointNetConfig::new()
            .with_input_size(64)
            .init::<TrainBackend>(&device);
        let images =
            Tensor::<TrainBackend, 4>::random([1, 1, 64, 64], Distribution::Default, &device);

        let first = model.forward(images.clone()).into_data();
        let second = model.forward(images).into_data();

        assert_ne!(
            first.to_vec::<f32>().unwrap(),
            second.to_vec::<f32>().unwrap()
        );
    }

    #[test]
    #[should_panic]
    fn rejects_mismatched_spatial_size() {
        let device = Default::default();
        let model = KeypointNetConfig::new().init::<TestBackend>(&device);
        let images =
            Tensor::<TestBackend, 4>::random([1, 1, 96, 96], Distribution::Default, &device);

        let _ = model.forward(images);
    }

    #[test]
    #[should_panic]
    fn rejects_multi_channel_input() {
        let device = Default::default();
        let model = KeypointNetConfig::new()
            .with_input_size(64)
            .init::<TestBackend>(&device);
        let images =
            Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);

        let _ = model.forward(images);
    }

    #[test]
    #[should_panic = "too small"]
    fn rejects_undersized_input_config() {
        let device = Default::default();
        let _ = KeypointNetConfig::new()
            .with_input_size(32)
            .init::<TestBackend>(&device);
    }
}
