use hl7::Hl7Error;

#[derive(Debug, thiserror::Error)]
pub enum RxError {
    /// A required record field is absent or blank; carries the dotted path.
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to translate record: {0}")]
    Translation(String),
    #[error("HL7 error: {0}")]
    Hl7(#[from] Hl7Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
}

pub type RxResult<T> = std::result::Result<T, RxError>;
