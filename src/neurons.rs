use std::error;
use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Describes the signal a layer consumes or produces: a flat feature count
/// plus whether a bias unit accompanies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neurons {
    count: usize,
    has_bias_unit: bool,
}

impl Neurons {
    pub fn new(count: usize, has_bias_unit: bool) -> Self {
        assert!(count > 0, "a neuron shape must contain at least one unit");
        Self {
            count,
            has_bias_unit,
        }
    }

    /// Feature count excluding the bias unit.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn has_bias_unit(&self) -> bool {
        self.has_bias_unit
    }

    /// Whether this shape can feed the given downstream shape.
    ///
    /// Bias units don't take part in the comparison: the sender never emits
    /// one and the receiver supplies its own, so with a bias unit both sides
    /// of the equation gain exactly one.
    pub fn is_compatible_with(&self, downstream: &Neurons) -> bool {
        self.count == downstream.count
    }
}

/// A three dimensional neuron shape as produced by image-like layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neurons3D {
    width: usize,
    height: usize,
    depth: usize,
    has_bias_unit: bool,
}

impl Neurons3D {
    pub fn new(width: usize, height: usize, depth: usize, has_bias_unit: bool) -> Self {
        assert!(
            width > 0 && height > 0 && depth > 0,
            "all dimensions of a 3D neuron shape must be non-zero"
        );
        Self {
            width,
            height,
            depth,
            has_bias_unit,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn has_bias_unit(&self) -> bool {
        self.has_bias_unit
    }

    /// Total unit count, `width * height * depth`.
    pub fn units(&self) -> usize {
        self.width * self.height * self.depth
    }
}

impl From<Neurons3D> for Neurons {
    fn from(n: Neurons3D) -> Neurons {
        Neurons::new(n.units(), n.has_bias_unit)
    }
}

/// Which axis of an activation matrix spans the feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureOrientation {
    RowsSpanFeatureSet,
    ColumnsSpanFeatureSet,
}

/// Ordering of the flattened image dimensions within the feature axis.
/// `DepthHeightWidth` means feature index `d * (h * w) + y * w + x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    DepthHeightWidth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationFormat {
    pub orientation: FeatureOrientation,
    pub image: Option<ImageFormat>,
}

impl ActivationFormat {
    /// The plain feature-major format used for label batches.
    pub fn rows_span_feature_set() -> Self {
        Self {
            orientation: FeatureOrientation::RowsSpanFeatureSet,
            image: None,
        }
    }

    /// Feature-major with the default image dimension ordering.
    pub fn default_image_format() -> Self {
        Self {
            orientation: FeatureOrientation::RowsSpanFeatureSet,
            image: Some(ImageFormat::DepthHeightWidth),
        }
    }
}

/// A batch of example vectors flowing between layers, tagged with the neuron
/// shape it was produced for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuronsActivation {
    matrix: Array2<f32>,
    neurons: Neurons,
    format: ActivationFormat,
}

impl NeuronsActivation {
    /// Wraps an activation matrix. The feature axis implied by the format
    /// must match the declared neuron count.
    pub fn new(
        matrix: Array2<f32>,
        neurons: Neurons,
        format: ActivationFormat,
    ) -> Result<Self, ShapeMismatch> {
        let features = match format.orientation {
            FeatureOrientation::RowsSpanFeatureSet => matrix.nrows(),
            FeatureOrientation::ColumnsSpanFeatureSet => matrix.ncols(),
        };
        if features != neurons.count() {
            return Err(ShapeMismatch::Features {
                context: "activation matrix".into(),
                expected: neurons.count(),
                received: features,
            });
        }
        Ok(Self {
            matrix,
            neurons,
            format,
        })
    }

    pub fn neurons(&self) -> Neurons {
        self.neurons
    }

    pub fn format(&self) -> ActivationFormat {
        self.format
    }

    pub fn feature_count(&self) -> usize {
        self.neurons.count()
    }

    pub fn example_count(&self) -> usize {
        match self.format.orientation {
            FeatureOrientation::RowsSpanFeatureSet => self.matrix.ncols(),
            FeatureOrientation::ColumnsSpanFeatureSet => self.matrix.nrows(),
        }
    }

    /// The underlying `[features, examples]` matrix.
    pub fn values(&self) -> &Array2<f32> {
        &self.matrix
    }

    pub fn into_values(self) -> Array2<f32> {
        self.matrix
    }
}

/// A neuron-shape disagreement detected at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeMismatch {
    /// The feature axis doesn't match the declared neuron count.
    Features {
        context: String,
        expected: usize,
        received: usize,
    },
    /// Two batches that must be example-aligned aren't.
    Examples { expected: usize, received: usize },
}

impl error::Error for ShapeMismatch {}
impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeMismatch::Features {
                context,
                expected,
                received,
            } => f.write_fmt(format_args!(
                "Shape mismatch in {}: expected {} features but received {}.",
                context, expected, received
            )),
            ShapeMismatch::Examples { expected, received } => f.write_fmt(format_args!(
                "Example count mismatch: expected {} examples but received {}.",
                expected, received
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_d_unit_count() {
        let n = Neurons3D::new(28, 28, 1, true);
        assert_eq!(n.units(), 784);
        let flat: Neurons = n.into();
        assert_eq!(flat.count(), 784);
        assert!(flat.has_bias_unit());
    }

    #[test]
    fn compatibility_ignores_bias_units() {
        let sender = Neurons::new(600, false);
        let receiver = Neurons::new(600, true);
        assert!(sender.is_compatible_with(&receiver));
        assert!(!sender.is_compatible_with(&Neurons::new(601, false)));
    }

    #[test]
    fn activation_checks_feature_axis() {
        let m = Array2::<f32>::zeros((10, 4));
        assert!(NeuronsActivation::new(
            m.clone(),
            Neurons::new(10, false),
            ActivationFormat::rows_span_feature_set()
        )
        .is_ok());
        assert!(NeuronsActivation::new(
            m,
            Neurons::new(11, false),
            ActivationFormat::rows_span_feature_set()
        )
        .is_err());
    }
}
