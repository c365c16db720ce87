#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("WASM parsing error: {0}")]
    WasmParse(#[from] wasmparser::BinaryReaderError),

    #[error("unsupported construct `{construct}` in function `{function}`")]
    Unsupported { construct: String, function: String },

    #[error("malformed IR in function `{function}`: {detail}")]
    Malformed { detail: String, function: String },

    #[error("internal invariant violation in function `{function}`: {detail}")]
    Internal { detail: String, function: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn unsupported(construct: impl Into<String>, function: impl Into<String>) -> Self {
        Self::Unsupported {
            construct: construct.into(),
            function: function.into(),
        }
    }

    #[must_use]
    pub fn malformed(detail: impl Into<String>, function: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
            function: function.into(),
        }
    }

    #[must_use]
    pub fn internal(detail: impl Into<String>, function: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
            function: function.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
