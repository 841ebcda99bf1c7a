use std::path::Path;
use std::process;

use burn::tensor::{Distribution, Tensor};
use facial_keypoints::{inference, model::KeypointNetConfig, DefaultBackend};

fn main() {
    let device = Default::default();
    let config = KeypointNetConfig::new();
    let model = config.init::<DefaultBackend>(&device);

    match std::env::args().nth(1) {
        Some(path) => {
            let keypoints = match inference::predict(&model, Path::new(&path), &device) {
                Ok(keypoints) => keypoints,
                Err(err) => {
                    eprintln!("failed to read {path}: {err}");
                    process::exit(1);
                }
            };
            for (index, [x, y]) in keypoints.into_iter().enumerate() {
                println!("keypoint {index:2}: ({x:8.3}, {y:8.3})");
            }
        }
        None => {
            // No image given; push a random tensor through once to show the
            // configured shapes.
            let input = Tensor::<DefaultBackend, 4>::random(
                [1, 1, config.input_size, config.input_size],
                Distribution::Default,
                &device,
            );
            let output = model.forward(input);

            println!("{model}");
            println!("forward: [1, 1, {size}, {size}] -> {dims:?}",
                size = config.input_size,
                dims = output.dims(),
            );
        }
    }
}
