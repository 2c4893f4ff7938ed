use ndarray::{Array2, Axis};

/// Index of the maximum value in each column of a `[features, examples]`
/// matrix. Ties resolve to the first occurrence.
pub fn column_argmaxs(matrix: &Array2<f32>) -> Vec<usize> {
    matrix
        .axis_iter(Axis(1))
        .map(|col| {
            let mut best = 0;
            let mut max = f32::NEG_INFINITY;
            for (i, &v) in col.iter().enumerate() {
                if v > max {
                    max = v;
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// One-hot encoding of a class index.
pub fn one_hot(class: usize, classes: usize) -> Vec<f32> {
    let mut v = vec![0.; classes];
    v[class] = 1.;
    v
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    /// Compares two slices with the given error tolerance. Panics with a
    /// diagnostic if they differ or contain a NaN.
    pub(crate) fn check(expected: &[f32], output: &[f32], tolerance: f32, id: &str) {
        assert_eq!(expected.len(), output.len(), "length mismatch for {}", id);
        let diag = || format!("expected: {:?}\nreceived: {:?}", expected, output);
        for (e, o) in expected.iter().zip(output) {
            if !(f32::abs(e - o) < tolerance) {
                panic!("Evaluation produced incorrect {}.\n{}", id, diag())
            }
        }
    }

    #[test]
    fn argmax_per_column() {
        let m = array![[0.1, 0.9], [0.7, 0.05], [0.2, 0.05]];
        assert_eq!(column_argmaxs(&m), vec![1, 0]);
    }

    #[test]
    fn one_hot_encoding() {
        assert_eq!(one_hot(2, 4), vec![0., 0., 1., 0.]);
    }
}
