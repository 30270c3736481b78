//! Error taxonomy for the stencil workflow.
//!
//! Every failure the session can hit falls into one of four families. None of
//! them is fatal: the session turns them into a log line plus, where the user
//! needs to know, a short message.

use std::fmt;

/// Generic message shown for any failed generation. The real cause is logged.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to generate stencil. Please check your API key and try again.";

// ============================================================================
// VALIDATION
// ============================================================================

/// Rejected upload. Reported inline; the session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NotAnImage,
    TooLarge { size: usize },
    Unreadable(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NotAnImage => {
                write!(f, "Please upload a valid image file (JPG, PNG, WebP).")
            }
            ValidationError::TooLarge { .. } => write!(f, "File size exceeds 10MB limit."),
            ValidationError::Unreadable(e) => write!(f, "Could not read file: {}", e),
        }
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// TRANSFORM
// ============================================================================

/// Recolor / decode / encode failure. The caller keeps its previous buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    Decode(String),
    Encode(String),
    Dimensions { width: u32, height: u32 },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::Decode(e) => write!(f, "Failed to decode image: {}", e),
            TransformError::Encode(e) => write!(f, "Failed to encode image: {}", e),
            TransformError::Dimensions { width, height } => {
                write!(f, "Pixel buffer does not match {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for TransformError {}

impl From<image::ImageError> for TransformError {
    fn from(e: image::ImageError) -> Self {
        TransformError::Decode(e.to_string())
    }
}

impl From<base64::DecodeError> for TransformError {
    fn from(e: base64::DecodeError) -> Self {
        TransformError::Decode(e.to_string())
    }
}

// ============================================================================
// GENERATION
// ============================================================================

/// The generation service failed. `Transport` and `NoImage` are kept apart for
/// the log, but the user always sees [`GENERATION_FAILED_MESSAGE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    MissingApiKey(String),
    Transport(String),
    NoImage,
    Decode(String),
}

impl GenerationError {
    pub fn user_message(&self) -> &'static str {
        GENERATION_FAILED_MESSAGE
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::MissingApiKey(var) => {
                write!(f, "No API key found in environment variable {}", var)
            }
            GenerationError::Transport(e) => write!(f, "Generation request failed: {}", e),
            GenerationError::NoImage => write!(f, "No image generated in response"),
            GenerationError::Decode(e) => write!(f, "Generated image could not be decoded: {}", e),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<TransformError> for GenerationError {
    fn from(e: TransformError) -> Self {
        GenerationError::Decode(e.to_string())
    }
}

// ============================================================================
// PERSISTENCE
// ============================================================================

/// Store read/write failure. Degrades to "empty" or "unsaved", never blocks editing.
#[derive(Debug)]
pub enum PersistenceError {
    Io(std::io::Error),
    Serialize(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "I/O error: {}", e),
            PersistenceError::Serialize(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Serialize(e.to_string())
    }
}

// ============================================================================
// UMBRELLA
// ============================================================================

#[derive(Debug)]
pub enum StencilError {
    Validation(ValidationError),
    Transform(TransformError),
    Generation(GenerationError),
    Persistence(PersistenceError),
}

impl StencilError {
    /// Text suitable for the status line. Generation causes stay hidden.
    pub fn user_message(&self) -> String {
        match self {
            StencilError::Validation(e) => e.to_string(),
            StencilError::Transform(e) => e.to_string(),
            StencilError::Generation(e) => e.user_message().to_string(),
            StencilError::Persistence(e) => e.to_string(),
        }
    }
}

impl fmt::Display for StencilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StencilError::Validation(e) => write!(f, "{}", e),
            StencilError::Transform(e) => write!(f, "{}", e),
            StencilError::Generation(e) => write!(f, "{}", e),
            StencilError::Persistence(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StencilError {}

impl From<ValidationError> for StencilError {
    fn from(e: ValidationError) -> Self {
        StencilError::Validation(e)
    }
}

impl From<TransformError> for StencilError {
    fn from(e: TransformError) -> Self {
        StencilError::Transform(e)
    }
}

impl From<GenerationError> for StencilError {
    fn from(e: GenerationError) -> Self {
        StencilError::Generation(e)
    }
}

impl From<PersistenceError> for StencilError {
    fn from(e: PersistenceError) -> Self {
        StencilError::Persistence(e)
    }
}
