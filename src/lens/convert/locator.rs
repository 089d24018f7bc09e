//! Date-keyed lookup of RIB archives in a directory.

use crate::error::{ConvertError, Result};
use chrono::NaiveDate;
use itertools::Itertools;
use std::path::{Path, PathBuf};

const ARCHIVE_PREFIX: &str = "rib.";
const ARCHIVE_SUFFIX: &str = ".bz2";
/// Length of the `HHMM` slot between the date and the suffix.
const TIME_SLOT_LEN: usize = 4;

/// Finds `rib.YYYYMMDD.HHMM.bz2` archives for a given day.
#[derive(Debug, Clone)]
pub struct ArchiveLocator {
    dir: PathBuf,
}

impl ArchiveLocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archives for `date`, in lexical file name order.
    ///
    /// The four characters of the time slot are not interpreted.
    pub fn locate(&self, date: NaiveDate) -> Result<Vec<PathBuf>> {
        let stem = format!("{}{}.", ARCHIVE_PREFIX, date.format("%Y%m%d"));
        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| ConvertError::io(&self.dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConvertError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if matches_archive_name(name, &stem) {
                names.push(name.to_string());
            }
        }

        Ok(names
            .into_iter()
            .sorted()
            .map(|name| self.dir.join(name))
            .collect())
    }
}

fn matches_archive_name(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_suffix(ARCHIVE_SUFFIX))
        .map(|slot| slot.chars().count() == TIME_SLOT_LEN)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_name_matching() {
        let stem = "rib.20200101.";
        assert!(matches_archive_name("rib.20200101.0000.bz2", stem));
        assert!(matches_archive_name("rib.20200101.abcd.bz2", stem));
        assert!(!matches_archive_name("rib.20200101.000.bz2", stem));
        assert!(!matches_archive_name("rib.20200101.00000.bz2", stem));
        assert!(!matches_archive_name("rib.20200101.0000.gz", stem));
        assert!(!matches_archive_name("rib.20200102.0000.bz2", stem));
        assert!(!matches_archive_name("xrib.20200101.0000.bz2", stem));
    }

    #[test]
    fn test_locate_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "rib.20200101.1200.bz2");
        touch(dir.path(), "rib.20200101.0000.bz2");
        touch(dir.path(), "rib.20200102.0000.bz2");
        touch(dir.path(), "updates.20200101.0000.bz2");

        let locator = ArchiveLocator::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let first = locator.locate(date).unwrap();
        assert_eq!(
            first,
            vec![
                dir.path().join("rib.20200101.0000.bz2"),
                dir.path().join("rib.20200101.1200.bz2"),
            ]
        );
        assert_eq!(locator.locate(date).unwrap(), first);
    }

    #[test]
    fn test_locate_missing_day() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "rib.20200101.0000.bz2");
        let locator = ArchiveLocator::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2020, 1, 3).unwrap();
        assert!(locator.locate(date).unwrap().is_empty());
    }

    #[test]
    fn test_locate_unreadable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ArchiveLocator::new(dir.path().join("absent"));
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(matches!(
            locator.locate(date).unwrap_err(),
            ConvertError::Io { .. }
        ));
    }
}
