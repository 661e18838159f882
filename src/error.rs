use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The invoice record cannot be rendered; raised before any drawing.
    #[error("invalid invoice: {0}")]
    InvalidInput(String),
    #[error("text measurement failed: {0}")]
    Measurement(String),
    #[error("draw primitive failed: {0}")]
    DrawPrimitive(String),
    #[error("line items overflow into the total row by {overlap_milli}mpt")]
    LayoutOverflow { overlap_milli: i64 },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("asset error: {0}")]
    Asset(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid invoice payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        RenderError::InvalidInput(message.into())
    }
}

/// Failure of the QR collaborator. Never escapes a render: the crypto section
/// degrades to text only.
#[derive(Debug, Error)]
pub enum QrError {
    #[error("payload cannot be encoded: {0}")]
    Encode(String),
    #[error("qr image could not be rasterized: {0}")]
    Image(String),
}
