use thiserror::Error;

use super::normalize::DateField;
use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] ApiError),

    #[error("Failed to decode document: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Invalid date in {field}: {value:?}")]
    InvalidDate { field: DateField, value: String },
}
