//! Fingerprint command implementation.

use crate::cli::FingerprintArgs;
use crate::error::Result;
use crate::output::Formatter;
use std::fs;
use std::path::Path;

/// Execute the fingerprint command.
pub fn execute_fingerprint(args: FingerprintArgs, formatter: &Formatter) -> Result<()> {
    let (fingerprint, checksum) = fingerprint_file(&args.file)?;
    println!("{}", formatter.format_fingerprint(&fingerprint, checksum)?);
    Ok(())
}

/// Fingerprint and raw checksum of a JSON file.
fn fingerprint_file(path: &Path) -> Result<(String, u32)> {
    let content = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    Ok((reaper_fingerprint::fingerprint(&value), reaper_fingerprint::checksum(&value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = write_temp(r#"{"rules": ["KSV001"], "severity": "HIGH"}"#);
        let b = write_temp(r#"{ "severity": "HIGH", "rules": ["KSV001"] }"#);
        assert_eq!(fingerprint_file(a.path()).unwrap(), fingerprint_file(b.path()).unwrap());
    }

    #[test]
    fn test_content_changes_fingerprint() {
        let a = write_temp(r#"{"rules": ["KSV001"]}"#);
        let b = write_temp(r#"{"rules": ["KSV002"]}"#);
        assert_ne!(fingerprint_file(a.path()).unwrap().0, fingerprint_file(b.path()).unwrap().0);
    }

    #[test]
    fn test_invalid_json() {
        let file = write_temp("{not json");
        assert!(matches!(
            fingerprint_file(file.path()),
            Err(crate::CliError::Serialization(_))
        ));
    }
}
