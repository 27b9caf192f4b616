use candle_core::{DType, Device, Tensor};
use mcqrag_embed::masked_mean_l2;

#[test]
fn masked_mean_l2_ignores_padding() {
    let dev = Device::Cpu;
    // batch of two, two tokens each, hidden dim 4
    let h = Tensor::from_slice(
        &[
            1.0f32, 2.0, 3.0, 4.0, // row 0, token 0
            5.0, 6.0, 7.0, 8.0, // row 0, token 1 (masked)
            1.0, 0.0, 0.0, 0.0, // row 1, token 0
            3.0, 0.0, 0.0, 0.0, // row 1, token 1
        ],
        (2, 2, 4),
        &dev,
    )
    .unwrap();
    let mask = Tensor::from_slice(&[1i64, 0, 1, 1], (2, 2), &dev).unwrap().to_dtype(DType::F32).unwrap();
    let out: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();

    let norm = 30f32.sqrt();
    for (a, b) in out[0].iter().zip([1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm]) {
        assert!((a - b).abs() < 1e-5, "a={a} b={b}");
    }
    assert!((out[1][0] - 1.0).abs() < 1e-5);
    assert!(out[1][1].abs() < 1e-6);
}

#[test]
fn masked_mean_l2_rejects_wrong_rank() {
    let dev = Device::Cpu;
    let h = Tensor::zeros((2, 4), DType::F32, &dev).unwrap();
    let mask = Tensor::ones((2, 1), DType::F32, &dev).unwrap();
    assert!(masked_mean_l2(&h, &mask).is_err());
}
