use std::error;
use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Logical meaning of a weight-matrix axis segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    InputFeature,
    OutputFeature,
    InputDepth,
    OutputDepth,
    FilterHeight,
    FilterWidth,
}

/// Whether matrix rows correspond to the output-side or input-side
/// dimensions of the serialized blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightsOrientation {
    RowsSpanOutputDimensions,
    RowsSpanInputDimensions,
}

/// Maps the physical row-major layout of a serialized weight blob onto its
/// logical input-side and output-side dimensions. The same loader can then
/// service fully-connected and convolutional tensors alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightsFormat {
    input_dimensions: Vec<(Dimension, usize)>,
    output_dimensions: Vec<(Dimension, usize)>,
    orientation: WeightsOrientation,
}

impl WeightsFormat {
    pub fn new(
        input_dimensions: Vec<(Dimension, usize)>,
        output_dimensions: Vec<(Dimension, usize)>,
        orientation: WeightsOrientation,
    ) -> Self {
        Self {
            input_dimensions,
            output_dimensions,
            orientation,
        }
    }

    /// Layout of a fully-connected weight blob with rows spanning the
    /// output dimension.
    pub fn fully_connected(input_features: usize, output_features: usize) -> Self {
        Self::new(
            vec![(Dimension::InputFeature, input_features)],
            vec![(Dimension::OutputFeature, output_features)],
            WeightsOrientation::RowsSpanOutputDimensions,
        )
    }

    /// Layout of a convolutional filter blob: one row per output channel,
    /// columns ordered depth-major then filter row then filter column.
    pub fn convolutional(
        input_depth: usize,
        filter_height: usize,
        filter_width: usize,
        output_depth: usize,
    ) -> Self {
        Self::new(
            vec![
                (Dimension::InputDepth, input_depth),
                (Dimension::FilterHeight, filter_height),
                (Dimension::FilterWidth, filter_width),
            ],
            vec![(Dimension::OutputDepth, output_depth)],
            WeightsOrientation::RowsSpanOutputDimensions,
        )
    }

    pub fn orientation(&self) -> WeightsOrientation {
        self.orientation
    }

    pub fn input_count(&self) -> usize {
        self.input_dimensions.iter().map(|(_, n)| n).product()
    }

    pub fn output_count(&self) -> usize {
        self.output_dimensions.iter().map(|(_, n)| n).product()
    }
}

/// A learned weights matrix together with its layout descriptor.
///
/// Internally the values are always held output-major (`[output, input]`)
/// regardless of the physical orientation they were loaded in; the original
/// physical order can be reproduced exactly with [`to_row_major`].
///
/// [`to_row_major`]: WeightsMatrix::to_row_major
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsMatrix {
    matrix: Array2<f32>,
    format: WeightsFormat,
}

impl WeightsMatrix {
    /// Reinterprets a flat row-major sequence as a weights matrix of the
    /// declared layout.
    pub fn from_row_major(
        values: Vec<f32>,
        rows: usize,
        cols: usize,
        format: WeightsFormat,
    ) -> Result<Self, LayoutSizeMismatch> {
        if rows * cols != values.len() {
            return Err(LayoutSizeMismatch::FlatLength {
                rows,
                cols,
                received: values.len(),
            });
        }
        let (out_len, in_len) = match format.orientation {
            WeightsOrientation::RowsSpanOutputDimensions => (rows, cols),
            WeightsOrientation::RowsSpanInputDimensions => (cols, rows),
        };
        if format.output_count() != out_len {
            return Err(LayoutSizeMismatch::DimensionProduct {
                side: "output",
                declared: format.output_count(),
                axis_length: out_len,
            });
        }
        if format.input_count() != in_len {
            return Err(LayoutSizeMismatch::DimensionProduct {
                side: "input",
                declared: format.input_count(),
                axis_length: in_len,
            });
        }

        let matrix = Array2::from_shape_vec((rows, cols), values).map_err(|_| {
            LayoutSizeMismatch::FlatLength {
                rows,
                cols,
                received: rows * cols,
            }
        })?;
        let matrix = match format.orientation {
            WeightsOrientation::RowsSpanOutputDimensions => matrix,
            WeightsOrientation::RowsSpanInputDimensions => matrix.reversed_axes(),
        };
        Ok(Self { matrix, format })
    }

    /// Builds an output-major weights matrix directly, for freshly
    /// initialized layers.
    pub fn from_output_major(matrix: Array2<f32>, format: WeightsFormat) -> Self {
        debug_assert_eq!(matrix.nrows(), format.output_count());
        debug_assert_eq!(matrix.ncols(), format.input_count());
        Self { matrix, format }
    }

    /// Re-flattens the values in their original physical order.
    pub fn to_row_major(&self) -> Vec<f32> {
        match self.format.orientation {
            WeightsOrientation::RowsSpanOutputDimensions => self.matrix.iter().copied().collect(),
            WeightsOrientation::RowsSpanInputDimensions => self.matrix.t().iter().copied().collect(),
        }
    }

    pub fn format(&self) -> &WeightsFormat {
        &self.format
    }

    /// Output-major view of the values, `[output, input]`.
    pub fn values(&self) -> &Array2<f32> {
        &self.matrix
    }

    pub fn values_mut(&mut self) -> &mut Array2<f32> {
        &mut self.matrix
    }

    pub fn output_count(&self) -> usize {
        self.format.output_count()
    }

    pub fn input_count(&self) -> usize {
        self.format.input_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeaturesVectorOrientation {
    ColumnVector,
    RowVector,
}

/// Layout of a serialized bias blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasFormat {
    pub dimension: Dimension,
    pub orientation: FeaturesVectorOrientation,
}

impl BiasFormat {
    /// Column vector over output features, the usual case.
    pub fn default_bias_format() -> Self {
        Self {
            dimension: Dimension::OutputFeature,
            orientation: FeaturesVectorOrientation::ColumnVector,
        }
    }

    /// Column vector over output channels, for convolutional biases.
    pub fn output_depth_column() -> Self {
        Self {
            dimension: Dimension::OutputDepth,
            orientation: FeaturesVectorOrientation::ColumnVector,
        }
    }
}

/// A learned bias vector, stored as an `[output, 1]` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasVector {
    vector: Array2<f32>,
    format: BiasFormat,
}

impl BiasVector {
    pub fn from_row_major(
        values: Vec<f32>,
        rows: usize,
        format: BiasFormat,
    ) -> Result<Self, LayoutSizeMismatch> {
        if values.len() != rows {
            return Err(LayoutSizeMismatch::FlatLength {
                rows,
                cols: 1,
                received: values.len(),
            });
        }
        let vector = Array2::from_shape_vec((rows, 1), values).map_err(|_| {
            LayoutSizeMismatch::FlatLength {
                rows,
                cols: 1,
                received: rows,
            }
        })?;
        Ok(Self { vector, format })
    }

    pub fn zeroed(rows: usize, format: BiasFormat) -> Self {
        Self {
            vector: Array2::zeros((rows, 1)),
            format,
        }
    }

    pub fn to_row_major(&self) -> Vec<f32> {
        self.vector.iter().copied().collect()
    }

    pub fn format(&self) -> BiasFormat {
        self.format
    }

    /// The `[output, 1]` column of values.
    pub fn values(&self) -> &Array2<f32> {
        &self.vector
    }

    pub fn values_mut(&mut self) -> &mut Array2<f32> {
        &mut self.vector
    }

    pub fn output_count(&self) -> usize {
        self.vector.nrows()
    }
}

/// A serialized blob doesn't fit the layout it was declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutSizeMismatch {
    /// The flat sequence doesn't contain `rows * cols` values.
    FlatLength {
        rows: usize,
        cols: usize,
        received: usize,
    },
    /// The product of the declared dimensions disagrees with the matrix
    /// axis it maps to under the stated orientation.
    DimensionProduct {
        side: &'static str,
        declared: usize,
        axis_length: usize,
    },
    /// A tensor axis disagrees with the neuron shape it is attached to.
    NeuronCount {
        side: &'static str,
        tensor: usize,
        neurons: usize,
    },
    /// The input shape and the supplied bias tensor disagree about whether
    /// a bias unit exists.
    BiasPresence { declared: bool },
}

impl error::Error for LayoutSizeMismatch {}
impl fmt::Display for LayoutSizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutSizeMismatch::FlatLength {
                rows,
                cols,
                received,
            } => f.write_fmt(format_args!(
                "Expected {} values for a {}x{} tensor but received {}.",
                rows * cols,
                rows,
                cols,
                received
            )),
            LayoutSizeMismatch::DimensionProduct {
                side,
                declared,
                axis_length,
            } => f.write_fmt(format_args!(
                "The {} dimensions multiply to {} but the matching matrix axis has length {}.",
                side, declared, axis_length
            )),
            LayoutSizeMismatch::NeuronCount {
                side,
                tensor,
                neurons,
            } => f.write_fmt(format_args!(
                "The {} axis of the tensor has length {} but the declared neuron shape expects {}.",
                side, tensor, neurons
            )),
            LayoutSizeMismatch::BiasPresence { declared: true } => f.write_str(
                "The input shape declares a bias unit but no bias vector was supplied.",
            ),
            LayoutSizeMismatch::BiasPresence { declared: false } => f.write_str(
                "A bias vector was supplied but the input shape declares no bias unit.",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_output_major() {
        let raw: Vec<f32> = (1..=6).map(|x| x as f32).collect();
        let w = WeightsMatrix::from_row_major(raw.clone(), 2, 3, WeightsFormat::fully_connected(3, 2))
            .unwrap();
        assert_eq!(w.values().shape(), &[2, 3]);
        assert_eq!(w.to_row_major(), raw);
    }

    #[test]
    fn round_trip_input_major() {
        let raw: Vec<f32> = (1..=6).map(|x| x as f32).collect();
        let format = WeightsFormat::new(
            vec![(Dimension::InputFeature, 3)],
            vec![(Dimension::OutputFeature, 2)],
            WeightsOrientation::RowsSpanInputDimensions,
        );
        let w = WeightsMatrix::from_row_major(raw.clone(), 3, 2, format).unwrap();
        // normalized to output-major internally
        assert_eq!(w.values().shape(), &[2, 3]);
        assert_eq!(w.values()[[0, 1]], 3.);
        // but the physical order is reproduced exactly
        assert_eq!(w.to_row_major(), raw);
    }

    #[test]
    fn flat_length_is_checked() {
        let err = WeightsMatrix::from_row_major(vec![0.; 5], 2, 3, WeightsFormat::fully_connected(3, 2))
            .unwrap_err();
        assert_eq!(
            err,
            LayoutSizeMismatch::FlatLength {
                rows: 2,
                cols: 3,
                received: 5
            }
        );
    }

    #[test]
    fn dimension_products_are_checked() {
        let err = WeightsMatrix::from_row_major(
            vec![0.; 6],
            2,
            3,
            WeightsFormat::fully_connected(4, 2),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LayoutSizeMismatch::DimensionProduct {
                side: "input",
                declared: 4,
                axis_length: 3
            }
        );
    }

    #[test]
    fn conv_format_products() {
        let format = WeightsFormat::convolutional(1, 9, 9, 6);
        assert_eq!(format.input_count(), 81);
        assert_eq!(format.output_count(), 6);
    }

    #[test]
    fn bias_round_trip() {
        let b = BiasVector::from_row_major(vec![1., 2., 3.], 3, BiasFormat::default_bias_format())
            .unwrap();
        assert_eq!(b.values().shape(), &[3, 1]);
        assert_eq!(b.to_row_major(), vec![1., 2., 3.]);
        assert!(BiasVector::from_row_major(vec![1.], 3, BiasFormat::default_bias_format()).is_err());
    }
}
