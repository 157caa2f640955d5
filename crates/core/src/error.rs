use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid model uuid: {0}")]
    InvalidModelUuid(String),
}
