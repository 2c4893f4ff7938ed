use std::error::Error;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;

use crate::helpers::one_hot;
use crate::neurons::{ActivationFormat, Neurons, NeuronsActivation, ShapeMismatch};

/// Turns the fields of one CSV row into a feature vector.
pub trait CsvDataExtractor {
    /// `line` is the zero-based line number in the file, for error reporting.
    fn extract(&self, fields: &[&str], line: usize) -> Result<Vec<f32>, DataError>;
}

/// Extracts greyscale pixel intensities scaled to `[0, 1]`, skipping the
/// leading label column.
pub struct PixelFeaturesExtractor;

impl CsvDataExtractor for PixelFeaturesExtractor {
    fn extract(&self, fields: &[&str], line: usize) -> Result<Vec<f32>, DataError> {
        fields
            .iter()
            .skip(1)
            .map(|field| {
                field
                    .trim()
                    .parse::<f32>()
                    .map(|v| v / 255.)
                    .map_err(|_| DataError::Parse {
                        line,
                        value: (*field).into(),
                    })
            })
            .collect()
    }
}

/// Extracts the leading label column as a one-hot vector over the digit
/// classes 0 through 9.
pub struct SingleDigitLabelExtractor;

impl SingleDigitLabelExtractor {
    const CLASSES: usize = 10;
}

impl CsvDataExtractor for SingleDigitLabelExtractor {
    fn extract(&self, fields: &[&str], line: usize) -> Result<Vec<f32>, DataError> {
        let field = fields.first().copied().unwrap_or("");
        let label = field.trim().parse::<usize>().map_err(|_| DataError::Parse {
            line,
            value: field.into(),
        })?;
        if label >= Self::CLASSES {
            return Err(DataError::Label { line, label });
        }
        Ok(one_hot(label, Self::CLASSES))
    }
}

/// Loads the raw line range `[start, end)` of a CSV file into an
/// example-major matrix, one row per line. Line 0 is the header, so ranges
/// over data rows start at 1.
pub fn load_matrix_from_csv(
    path: impl AsRef<Path>,
    extractor: &impl CsvDataExtractor,
    start: usize,
    end: usize,
) -> Result<Array2<f32>, DataError> {
    if start >= end {
        return Err(DataError::EmptyRange { start, end });
    }

    let file = File::open(path.as_ref())?;
    let mut width = None;
    let mut values = Vec::new();
    let mut rows = 0;
    let mut lines_seen = 0;
    for (line, text) in BufReader::new(file).lines().enumerate() {
        let text = text?;
        lines_seen = line + 1;
        if line < start {
            continue;
        }
        if line >= end {
            break;
        }

        let fields: Vec<&str> = text.split(',').collect();
        let row = extractor.extract(&fields, line)?;
        match width {
            None => width = Some(row.len()),
            Some(expected) if expected != row.len() => {
                return Err(DataError::Ragged {
                    line,
                    expected,
                    received: row.len(),
                });
            }
            Some(_) => {}
        }
        values.extend(row);
        rows += 1;
    }

    if rows < end - start {
        return Err(DataError::RangeOutOfBounds {
            start,
            end,
            lines: lines_seen,
        });
    }
    // width is present whenever the range is non-empty
    let width = width.unwrap_or(0);
    Array2::from_shape_vec((rows, width), values).map_err(|_| DataError::Ragged {
        line: start,
        expected: width,
        received: 0,
    })
}

/// Wraps an example-major matrix as a feature-major activation batch for the
/// given neuron shape.
pub fn to_neurons_activation(
    matrix: Array2<f32>,
    neurons: Neurons,
    format: ActivationFormat,
) -> Result<NeuronsActivation, DataError> {
    NeuronsActivation::new(matrix.reversed_axes(), neurons, format).map_err(DataError::Shape)
}

#[derive(Debug)]
pub enum DataError {
    Io(std::io::Error),
    /// A field could not be parsed as a number.
    Parse {
        line: usize,
        value: String,
    },
    /// A label fell outside the digit classes.
    Label {
        line: usize,
        label: usize,
    },
    /// A row's width disagrees with the rows before it.
    Ragged {
        line: usize,
        expected: usize,
        received: usize,
    },
    /// The requested line range extends past the end of the file.
    RangeOutOfBounds {
        start: usize,
        end: usize,
        lines: usize,
    },
    EmptyRange {
        start: usize,
        end: usize,
    },
    /// The loaded matrix doesn't fit the declared neuron shape.
    Shape(ShapeMismatch),
}

impl From<std::io::Error> for DataError {
    fn from(e: std::io::Error) -> Self {
        DataError::Io(e)
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DataError::Io(e) => Some(e),
            DataError::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::Io(e) => f.write_fmt(format_args!("Failed to read csv data: {}", e)),
            DataError::Parse { line, value } => f.write_fmt(format_args!(
                "Line {}: '{}' is not a number",
                line, value
            )),
            DataError::Label { line, label } => f.write_fmt(format_args!(
                "Line {}: label {} is not a single digit",
                line, label
            )),
            DataError::Ragged {
                line,
                expected,
                received,
            } => f.write_fmt(format_args!(
                "Line {}: expected {} values per row but found {}",
                line, expected, received
            )),
            DataError::RangeOutOfBounds { start, end, lines } => f.write_fmt(format_args!(
                "Requested lines [{}, {}) of a {}-line file",
                start, end, lines
            )),
            DataError::EmptyRange { start, end } => f.write_fmt(format_args!(
                "Requested an empty line range [{}, {})",
                start, end
            )),
            DataError::Shape(e) => e.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_csv(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const CSV: &str = "label,p1,p2\n7,0,255\n3,51,102\n1,255,0\n";

    #[test]
    fn loads_scaled_pixel_rows() {
        let path = write_csv("pixels.csv", CSV);
        let m = load_matrix_from_csv(&path, &PixelFeaturesExtractor, 1, 3).unwrap();
        assert_eq!(m.shape(), &[2, 2]);
        assert_eq!(m[[0, 0]], 0.);
        assert_eq!(m[[0, 1]], 1.);
        assert_eq!(m[[1, 0]], 0.2);
        assert_eq!(m[[1, 1]], 0.4);
    }

    #[test]
    fn loads_one_hot_labels() {
        let path = write_csv("labels.csv", CSV);
        let m = load_matrix_from_csv(&path, &SingleDigitLabelExtractor, 1, 4).unwrap();
        assert_eq!(m.shape(), &[3, 10]);
        assert_eq!(m[[0, 7]], 1.);
        assert_eq!(m[[1, 3]], 1.);
        assert_eq!(m[[2, 1]], 1.);
        assert_eq!(m.sum(), 3.);
    }

    #[test]
    fn rejects_a_range_past_the_end() {
        let path = write_csv("short.csv", CSV);
        assert!(matches!(
            load_matrix_from_csv(&path, &PixelFeaturesExtractor, 1, 40),
            Err(DataError::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn rejects_an_empty_range() {
        let path = write_csv("empty_range.csv", CSV);
        assert!(matches!(
            load_matrix_from_csv(&path, &PixelFeaturesExtractor, 2, 2),
            Err(DataError::EmptyRange { .. })
        ));
    }

    #[test]
    fn rejects_unparseable_fields() {
        let path = write_csv("bad.csv", "label,p1\n7,zero\n");
        assert!(matches!(
            load_matrix_from_csv(&path, &PixelFeaturesExtractor, 1, 2),
            Err(DataError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_labels() {
        let path = write_csv("bad_label.csv", "label,p1\n11,0\n");
        assert!(matches!(
            load_matrix_from_csv(&path, &SingleDigitLabelExtractor, 1, 2),
            Err(DataError::Label { .. })
        ));
    }

    #[test]
    fn activation_batch_is_feature_major() {
        let path = write_csv("to_activation.csv", CSV);
        let m = load_matrix_from_csv(&path, &PixelFeaturesExtractor, 1, 4).unwrap();
        let batch = to_neurons_activation(
            m,
            Neurons::new(2, false),
            ActivationFormat::rows_span_feature_set(),
        )
        .unwrap();
        assert_eq!(batch.feature_count(), 2);
        assert_eq!(batch.example_count(), 3);
        assert_eq!(batch.values()[[1, 0]], 1.);
    }
}
