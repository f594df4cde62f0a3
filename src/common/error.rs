use thiserror::Error;

/// Result type for reobf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the reobf engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed mapping file at line {line}: {message}")]
    MalformedMapping { line: usize, message: String },

    #[error("Classpath resolution failed for {class}: {message}")]
    ClasspathResolution { class: String, message: String },

    #[error("Malformed class file {class}: {message}")]
    ClassFileRead { class: String, message: String },

    #[error("Contributor {contributor} failed: {message}")]
    ContributorExecution {
        contributor: String,
        message: String,
    },

    #[error("Field mapping lookup failed for {class}: {message}")]
    FieldAmbiguity { class: String, message: String },
}

impl Error {
    /// Create a malformed-mapping error with line information
    pub fn malformed_mapping(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedMapping {
            line,
            message: message.into(),
        }
    }

    /// Create a classpath resolution error
    pub fn classpath_resolution(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClasspathResolution {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Create a class file read error
    pub fn class_file_read(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClassFileRead {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Create a contributor execution error
    pub fn contributor_execution(
        contributor: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ContributorExecution {
            contributor: contributor.into(),
            message: message.into(),
        }
    }

    /// Create a field ambiguity error
    pub fn field_ambiguity(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FieldAmbiguity {
            class: class.into(),
            message: message.into(),
        }
    }
}
