// ============================================================================
// ENGINE ERRORS — every recoverable failure an editing command can report
// ============================================================================

use std::fmt;

/// Discriminated failure returned by every engine operation.
///
/// All variants except [`EditorError::Allocation`] are recoverable: the
/// operation that produced them left the document, history and interaction
/// mode untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorError {
    /// A command that needs an image was issued before a successful load.
    NoDocumentLoaded,
    /// Undo or redo with nothing on the respective stack.
    EmptyHistory,
    /// Crop or text placement committed before both corners were set.
    EmptySelection,
    /// Crop or text placement committed with a zero-area rectangle.
    DegenerateRegion,
    /// The image file could not be read or decoded.
    Decode(String),
    /// The image could not be encoded or written.
    Encode(String),
    /// A numeric parameter fell outside its documented range.
    UnsupportedParameter {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// An interactive step arrived while the engine was in another mode.
    InvalidMode { expected: &'static str },
    /// No font could be loaded for text stamping.
    FontUnavailable(String),
    /// The pixel storage for a buffer of this size could not be reserved.
    Allocation { width: u32, height: u32 },
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::NoDocumentLoaded => write!(f, "No image loaded"),
            EditorError::EmptyHistory => write!(f, "Nothing to undo or redo"),
            EditorError::EmptySelection => write!(f, "Select a region first"),
            EditorError::DegenerateRegion => write!(f, "Selected region has zero area"),
            EditorError::Decode(e) => write!(f, "Decode error: {}", e),
            EditorError::Encode(e) => write!(f, "Encode error: {}", e),
            EditorError::UnsupportedParameter { name, value, min, max } => write!(
                f,
                "Parameter '{}' = {} is outside the range [{}, {}]",
                name, value, min, max
            ),
            EditorError::InvalidMode { expected } => {
                write!(f, "Command requires {} mode", expected)
            }
            EditorError::FontUnavailable(e) => write!(f, "Font unavailable: {}", e),
            EditorError::Allocation { width, height } => {
                write!(f, "Cannot allocate a {}x{} pixel buffer", width, height)
            }
        }
    }
}

impl std::error::Error for EditorError {}

pub type Result<T> = std::result::Result<T, EditorError>;

/// Reject `value` unless it lies in `[min, max]`.
pub(crate) fn check_range<T>(name: &'static str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + Copy + Into<f64>,
{
    if value < min || value > max {
        return Err(EditorError::UnsupportedParameter {
            name,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_range_accepts_bounds() {
        assert!(check_range("contrast", -100, -100, 100).is_ok());
        assert!(check_range("contrast", 100, -100, 100).is_ok());
    }

    #[test]
    fn check_range_reports_offending_value() {
        let err = check_range("contrast", 101, -100, 100).unwrap_err();
        assert_eq!(
            err,
            EditorError::UnsupportedParameter { name: "contrast", value: 101.0, min: -100.0, max: 100.0 }
        );
        assert!(err.to_string().contains("contrast"));
    }
}
