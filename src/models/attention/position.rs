use burn::{
    module::{Module, Param},
    nn::Embedding,
    tensor::{backend::Backend, Tensor},
};

use crate::utils::tensors::float_tensor;

/// Sinusoid position table, `[n_position, d_hid]` in row-major order.
///
/// `table[p, j] = sin(p / 10000^(2 * (j / 2) / d_hid))` for even `j` and `cos` of the same angle for
/// odd `j`. Row 0 is reserved for padding and stays zero.
pub fn sinusoid_table(n_position: usize, d_hid: usize) -> Vec<f32> {
    let mut table = vec![0.0f32; n_position * d_hid];

    for pos in 1..n_position {
        for j in 0..d_hid {
            let angle = pos as f64 / 10000f64.powf((2 * (j / 2)) as f64 / d_hid as f64);

            let value = if j % 2 == 0 { angle.sin() } else { angle.cos() };

            table[pos * d_hid + j] = value as f32;
        }
    }

    table
}

/// A frozen embedding holding the sinusoid position table. Position 0 maps to the zero vector.
pub fn position_embedding<B: Backend>(
    n_position: usize,
    d_hid: usize,
    device: &B::Device,
) -> Embedding<B> {
    let weight: Tensor<B, 2> = float_tensor(
        sinusoid_table(n_position, d_hid),
        [n_position, d_hid],
        device,
    );

    Embedding {
        weight: Param::from_tensor(weight),
    }
    .no_grad()
}
