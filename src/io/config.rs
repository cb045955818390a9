//! Read/write the inversion configuration JSON.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::GfastConfig;
use crate::error::AppError;

/// Load and validate a configuration file. With no path the defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<GfastConfig, AppError> {
    let mut config = match path {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| AppError::new(2, format!("Failed to open config JSON '{}': {e}", path.display())))?;
            parse_config(file)?
        }
        None => GfastConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Parse (without validating) a configuration from any reader.
pub fn parse_config<R: Read>(reader: R) -> Result<GfastConfig, AppError> {
    serde_json::from_reader(reader).map_err(|e| AppError::new(2, format!("Invalid config JSON: {e}")))
}

pub fn write_config(path: &Path, config: &GfastConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create config JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, config)
        .map_err(|e| AppError::new(2, format!("Failed to write config JSON: {e}")))?;
    Ok(())
}
