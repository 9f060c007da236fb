//! JSON export for analysis reports and calibration results.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Export any serializable record to a JSON file.
///
/// The output is pretty-printed for human readability.
pub fn export_to_json<T: Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<()> {
    let json = to_pretty_json(value)?;

    let mut file = File::create(output_path)
        .context(format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}

/// Pretty JSON text of `value`, for printing to stdout.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize to JSON")
}
