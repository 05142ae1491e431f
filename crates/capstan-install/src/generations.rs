#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::InstallResult;

/// Whether `name` is a valid generation directory name:
/// `vYYYY.MM.DD-sha.<7 lowercase-or-uppercase hex>`.
pub fn is_generation_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('v') else {
        return false;
    };
    let Some((date, sha)) = rest.split_once("-sha.") else {
        return false;
    };

    let mut fields = date.split('.');
    let date_ok = matches!(
        (fields.next(), fields.next(), fields.next(), fields.next()),
        (Some(y), Some(m), Some(d), None)
            if y.len() == 4 && m.len() == 2 && d.len() == 2
                && [y, m, d].iter().all(|f| f.bytes().all(|b| b.is_ascii_digit()))
    );

    date_ok && sha.len() == 7 && sha.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Directories under `root` that look like install generations, sorted by
/// name. Version names sort chronologically, so the last entry is the
/// newest.
pub fn scan_generations(root: &Path) -> InstallResult<Vec<String>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_generation_name(name) {
                found.push(name.to_string());
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Remove a generation directory tree. A generation that is already gone
/// is not an error.
pub fn remove_generation(root: &Path, version: &str) -> InstallResult<()> {
    let dir = root.join(version);
    match fs::remove_dir_all(&dir) {
        Ok(()) => {
            debug!(version, "removed generation");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::steady("v2025.01.15-sha.abc1234", true)]
    #[case::uppercase_hex("v2024.12.01-sha.ABCDEF0", true)]
    #[case::no_prefix("2025.01.15-sha.abc1234", false)]
    #[case::short_sha("v2025.01.15-sha.abc123", false)]
    #[case::long_sha("v2025.01.15-sha.abc12345", false)]
    #[case::non_hex_sha("v2025.01.15-sha.abc123g", false)]
    #[case::dashed_date("v2025-01-15-sha.abc1234", false)]
    #[case::short_year("v205.01.15-sha.abc1234", false)]
    #[case::extra_field("v2025.01.15.01-sha.abc1234", false)]
    #[case::plain_dir("data", false)]
    fn generation_name_validation(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_generation_name(name), expected);
    }

    #[test]
    fn scan_ignores_files_and_foreign_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("v2025.01.15-sha.abc1234")).unwrap();
        std::fs::create_dir(tmp.path().join("v2024.12.01-sha.aaaaaaa")).unwrap();
        std::fs::create_dir(tmp.path().join("data")).unwrap();
        std::fs::write(tmp.path().join("v2025.02.01-sha.bbbbbbb"), b"file").unwrap();

        let found = scan_generations(tmp.path()).unwrap();
        assert_eq!(
            found,
            vec![
                "v2024.12.01-sha.aaaaaaa".to_string(),
                "v2025.01.15-sha.abc1234".to_string(),
            ]
        );
    }

    #[test]
    fn remove_generation_tolerates_absence() {
        let tmp = tempfile::tempdir().unwrap();
        remove_generation(tmp.path(), "v2025.01.15-sha.abc1234").unwrap();

        let dir = tmp.path().join("v2025.01.15-sha.abc1234");
        std::fs::create_dir_all(dir.join("bin")).unwrap();
        std::fs::write(dir.join("bin/svc"), b"elf").unwrap();
        remove_generation(tmp.path(), "v2025.01.15-sha.abc1234").unwrap();
        assert!(!dir.exists());
    }
}
