use std::path::Path;
use crate::errors::AltscoutError;

/// Write to a sibling temp file, then rename over the target.
pub async fn atomic_write(path: &Path, content: &str) -> Result<(), AltscoutError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Version string with the commit and build time embedded at compile time.
pub fn build_info() -> String {
    format!(
        "{} ({} built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("dev"),
        option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        atomic_write(&path, "first").await.unwrap();
        atomic_write(&path, "second").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_build_info_has_version() {
        assert!(build_info().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
