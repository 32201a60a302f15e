// machine_learning.rs
pub mod nn;
pub mod reinforcement_learning;

#[cfg(test)]
fn compare_outputs(a: &[f32], b: &[f32]) -> bool {
    use float_cmp::{ApproxEq, F32Margin};

    if a.len() != b.len() {
        return false;
    }
    let lax_margin = F32Margin {
        epsilon: 1e-5,
        ulps: 50,
    };
    a.iter().zip(b).all(|(&a, &b)| a.approx_eq(b, lax_margin))
}

/// `num` evenly spaced values from `start` to `end`, both ends included.
pub fn linspace(start: f32, end: f32, num: usize) -> Vec<f32> {
    if num == 0 {
        return Vec::new();
    }
    let step = if num == 1 {
        0.0
    } else {
        (end - start) / (num - 1) as f32
    };
    (0..num).map(|i| start + step * i as f32).collect()
}
