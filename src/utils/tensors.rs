use burn::tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor};

/// Pad a list of id sequences to a fixed length, producing a `[batch_size, seq_length]` tensor
pub fn pad_to<B: Backend>(
    pad_id: usize,
    ids_list: Vec<Vec<usize>>,
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let batch_size = ids_list.len();

    let mut values = Vec::with_capacity(batch_size * seq_length);

    for ids in ids_list {
        let padding = seq_length.saturating_sub(ids.len());

        values.extend(ids.into_iter().take(seq_length).map(|e| e as i64));
        values.extend(std::iter::repeat(pad_id as i64).take(padding));
    }

    int_tensor::<B, 2>(values, [batch_size, seq_length], device)
}

/// Pad a list of float rows to a fixed length, producing a `[batch_size, seq_length]` tensor
pub fn pad_float_to<B: Backend>(
    pad_value: f32,
    rows: Vec<Vec<f32>>,
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let batch_size = rows.len();

    let mut values = Vec::with_capacity(batch_size * seq_length);

    for row in rows {
        let padding = seq_length.saturating_sub(row.len());

        values.extend(row.into_iter().take(seq_length));
        values.extend(std::iter::repeat(pad_value).take(padding));
    }

    float_tensor::<B, 2>(values, [batch_size, seq_length], device)
}

/// Build an integer tensor of the given shape from row-major values
pub fn int_tensor<B: Backend, const D: usize>(
    values: Vec<i64>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D, Int> {
    Tensor::from_data(
        Data::new(
            values.into_iter().map(|e| e.elem::<B::IntElem>()).collect(),
            Shape::new(shape),
        ),
        device,
    )
}

/// Build a float tensor of the given shape from row-major values
pub fn float_tensor<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_data(
        Data::new(
            values.into_iter().map(|e| e.elem::<B::FloatElem>()).collect(),
            Shape::new(shape),
        ),
        device,
    )
}

/// Pick the hidden states at the given positions along the sequence dimension.
///
/// `hidden` is `[batch_size, seq_length, hidden_size]` and `positions` is
/// `[batch_size, n_positions]`; the result is `[batch_size, n_positions, hidden_size]`.
pub fn select_positions<B: Backend>(
    hidden: Tensor<B, 3>,
    positions: Tensor<B, 2, Int>,
) -> Tensor<B, 3> {
    let [batch_size, n_positions] = positions.dims();
    let [_, _, hidden_size] = hidden.dims();

    let index = positions
        .reshape([batch_size, n_positions, 1])
        .repeat(2, hidden_size);

    hidden.gather(1, index)
}

/// Reverse a batch-first tensor along its sequence dimension
pub fn reverse_sequence<B: Backend>(input: Tensor<B, 3>) -> Tensor<B, 3> {
    let [_, seq_length, _] = input.dims();
    let device = input.device();

    let index = (0..seq_length).rev().map(|i| i as i64).collect();

    input.select(1, int_tensor::<B, 1>(index, [seq_length], &device))
}

/// Numerically stable `log(sum(exp(x)))` along `dim`, keeping the reduced dimension with size 1
pub fn log_sum_exp<B: Backend, const D: usize>(input: Tensor<B, D>, dim: usize) -> Tensor<B, D> {
    let size = input.dims()[dim];

    // The shift only stabilizes the exponent, so it carries no gradient
    let max = input.clone().detach().max_dim(dim);
    let shifted = input - max.clone().repeat(dim, size);

    max + shifted.exp().sum_dim(dim).log()
}

/// Read a float tensor back into a flat vector
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().value
}

/// Read an integer tensor back into a flat vector
pub fn to_ids<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Vec<usize> {
    tensor
        .into_data()
        .convert::<i64>()
        .value
        .into_iter()
        .map(|e| e as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_pad_to_fills_and_truncates() {
        let device = Default::default();

        let padded = pad_to::<TestBackend>(9, vec![vec![1, 2], vec![3, 4, 5, 6]], 3, &device);

        assert_eq!(padded.dims(), [2, 3]);
        assert_eq!(to_ids(padded), vec![1, 2, 9, 3, 4, 5]);
    }

    #[test]
    fn test_select_positions() {
        let device = Default::default();

        // [1, 4, 2]
        let hidden = float_tensor::<TestBackend, 3>(
            vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5],
            [1, 4, 2],
            &device,
        );
        let positions = int_tensor::<TestBackend, 2>(vec![3, 1], [1, 2], &device);

        let selected = select_positions(hidden, positions);

        assert_eq!(selected.dims(), [1, 2, 2]);
        assert_eq!(to_vec(selected), vec![3.0, 3.5, 1.0, 1.5]);
    }

    #[test]
    fn test_reverse_sequence() {
        let device = Default::default();

        let input =
            float_tensor::<TestBackend, 3>(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], [1, 3, 2], &device);

        assert_eq!(
            to_vec(reverse_sequence(input)),
            vec![5.0, 6.0, 3.0, 4.0, 1.0, 2.0]
        );
    }

    #[test]
    fn test_log_sum_exp_is_stable() {
        let device = Default::default();

        let input =
            float_tensor::<TestBackend, 2>(vec![1000.0, 1000.0, 0.0, 0.0], [2, 2], &device);

        let result = to_vec(log_sum_exp(input, 1));
        let expected = std::f32::consts::LN_2;

        assert!((result[0] - (1000.0 + expected)).abs() < 1e-3);
        assert!((result[1] - expected).abs() < 1e-5);
    }
}
