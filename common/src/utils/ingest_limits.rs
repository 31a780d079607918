use super::config::AppConfig;
use crate::{error::AppError, storage::types::file_info::FileInfo};

/// Rejects uploads that exceed the configured size limit. Runs before any
/// parsing so oversized files never reach the extractors.
pub fn validate_upload(config: &AppConfig, file: &FileInfo) -> Result<(), AppError> {
    let limit = u64::try_from(config.max_upload_bytes).unwrap_or(u64::MAX);
    if file.size > limit {
        return Err(AppError::FileTooLarge {
            size: file.size,
            limit,
        });
    }

    Ok(())
}
