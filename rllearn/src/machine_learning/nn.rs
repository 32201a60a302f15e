// nn.rs
pub mod activation;
pub mod fully_connected;
pub mod nn_error;
pub mod optimizer;
pub mod rbf_net;
pub mod weight_initialization;

use burn::tensor::{backend::Backend, Tensor, TensorData};

use nn_error::{NNError, Result};

/// Stacks `rows` into a `[rows, width]` tensor. Every row must have `width` values.
pub fn rows_to_tensor<B: Backend, R: AsRef<[f32]>>(
    op_name: &str,
    rows: &[R],
    width: usize,
    device: &B::Device,
) -> Result<Tensor<B, 2>> {
    if rows.is_empty() {
        return Err(NNError::EmptyBatch(op_name.to_string()));
    }
    let mut values = Vec::with_capacity(rows.len() * width);
    for row in rows {
        let row = row.as_ref();
        if row.len() != width {
            return Err(NNError::ShapeMismatch {
                op_name: op_name.to_string(),
                expected: vec![rows.len(), width],
                received: vec![rows.len(), row.len()],
            });
        }
        values.extend_from_slice(row);
    }
    let tensor_data = TensorData::new(values, [rows.len(), width]);
    Ok(Tensor::from_data(tensor_data, device))
}

pub fn tensor_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, width] = tensor.dims();
    let values: Vec<f32> = tensor.into_data().iter::<f32>().collect();
    values.chunks(width.max(1)).map(<[f32]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    #[test]
    fn test_rows_to_tensor_and_back() {
        let rows = vec![vec![1.0f32, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let tensor =
            rows_to_tensor::<NdArray, _>("test", &rows, 2, &Default::default()).unwrap();
        assert_eq!(tensor.dims(), [3, 2]);
        assert_eq!(tensor_to_rows(tensor), rows);
    }

    #[test]
    fn test_rows_to_tensor_rejects_ragged_rows() {
        let rows = vec![vec![1.0f32, 2.0], vec![3.0]];
        let result = rows_to_tensor::<NdArray, _>("ragged", &rows, 2, &Default::default());
        assert!(matches!(result, Err(NNError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_rows_to_tensor_rejects_empty_batch() {
        let rows: Vec<Vec<f32>> = Vec::new();
        let result = rows_to_tensor::<NdArray, _>("empty", &rows, 2, &Default::default());
        assert!(matches!(result, Err(NNError::EmptyBatch(_))));
    }
}
