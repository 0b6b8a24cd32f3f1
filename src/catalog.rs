//! Read-only reference sets that operator input is checked against.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    cmd,
    error::InstallerError,
    validate::{self, Rejection},
};

/// Entries shown per page when the operator browses a catalog.
pub const PAGE_SIZE: usize = 25;

/// A sorted list of valid values, matched exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<String>,
}

impl Catalog {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<String> = entries
            .into_iter()
            .map(Into::into)
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        entries.sort();
        entries.dedup();
        Self { entries }
    }

    /// Every file name directly under `dir`, e.g. `/usr/share/i18n/locales`.
    pub fn from_dir(dir: &Path) -> Result<Self, InstallerError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(Self::new(names))
    }

    /// Keymaps known to `localectl`.
    pub fn keymaps() -> Result<Self, InstallerError> {
        let output = cmd::run_capture("localectl", &["--no-pager", "list-keymaps"])?;
        Ok(Self::new(output.lines()))
    }

    pub fn contains(&self, value: &str) -> bool {
        self.entries.binary_search_by(|e| e.as_str().cmp(value)).is_ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Page `index` (zero-based) of the catalog, empty past the end.
    pub fn page(&self, index: usize) -> &[String] {
        self.entries
            .chunks(PAGE_SIZE)
            .nth(index)
            .unwrap_or(&[])
    }

    pub fn page_count(&self) -> usize {
        self.entries.len().div_ceil(PAGE_SIZE)
    }

    pub fn check(&self, value: &str, reason: &'static str) -> Result<(), Rejection> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(Rejection::single(reason))
        }
    }
}

/// The zoneinfo tree. A timezone is valid when it names a file under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimezoneCatalog {
    root: PathBuf,
}

impl TimezoneCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn check(&self, tz: &str) -> Result<(), Rejection> {
        validate::timezone_syntax(tz)?;
        if self.root.join(tz).is_file() {
            Ok(())
        } else {
            Err(Rejection::single("Timezone does not exist."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_only() {
        let catalog = Catalog::new(["en_US", "de_DE", "eu_ES@euro", ""]);
        assert_eq!(catalog.len(), 3);
        assert!(catalog.contains("en_US"));
        assert!(catalog.contains("eu_ES@euro"));
        assert!(!catalog.contains("en_us"));
        assert!(!catalog.contains("en_US.UTF-8"));
    }

    #[test]
    fn pages_are_fixed_size() {
        let catalog = Catalog::new((0..60).map(|i| format!("locale{:02}", i)));
        assert_eq!(catalog.page_count(), 3);
        assert_eq!(catalog.page(0).len(), PAGE_SIZE);
        assert_eq!(catalog.page(2).len(), 10);
        assert!(catalog.page(3).is_empty());
        assert_eq!(catalog.page(1)[0], "locale25");
    }

    #[test]
    fn directory_listing_becomes_catalog() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("en_US"), "").unwrap();
        fs::write(dir.path().join("lt_LT"), "").unwrap();

        let catalog = Catalog::from_dir(dir.path()).unwrap();
        assert_eq!(catalog.entries(), ["en_US", "lt_LT"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(Catalog::from_dir(Path::new("/nonexistent/locales")).is_err());
    }

    #[test]
    fn timezone_must_exist_as_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Europe")).unwrap();
        fs::write(dir.path().join("Europe/London"), "TZif").unwrap();

        let tz = TimezoneCatalog::new(dir.path());
        assert!(tz.check("Europe/London").is_ok());
        assert!(tz.check("Europe").is_err());
        assert!(tz.check("Europe/Paris").is_err());
        assert!(tz.check("../Europe/London").is_err());
    }
}
