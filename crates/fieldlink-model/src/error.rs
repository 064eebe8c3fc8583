use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid form id: {0:?}")]
    InvalidFormId(String),
    #[error("invalid field id: {0:?}")]
    InvalidFieldId(String),
    #[error("invalid target object name: {0:?}")]
    InvalidObjectName(String),
    #[error("duplicate field id {field_id} in form {form_id}")]
    DuplicateField { form_id: String, field_id: String },
    #[error("duplicate target object {0} in catalog")]
    DuplicateObject(String),
    #[error("target catalog has no primary object")]
    MissingPrimary,
}

pub type Result<T> = std::result::Result<T, ModelError>;
