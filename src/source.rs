//! Where element records come from.
//!
//! A screening run asks an [`ElementSource`] for the raw TLE text of each
//! object. Network catalogs sit behind the same trait; this crate ships a
//! file-backed and an in-memory source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::tle;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no element record for object {0}")]
    NotFound(u32),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("element source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies raw element text (2- or 3-line record) by catalog number.
pub trait ElementSource {
    fn fetch(&self, id: u32) -> Result<String, FetchError>;
}

/// Records held in memory, keyed by catalog number.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: BTreeMap<u32, String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, record: impl Into<String>) {
        self.records.insert(id, record.into());
    }

    pub fn with_record(mut self, id: u32, record: impl Into<String>) -> Self {
        self.insert(id, record);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for StaticSource {
    fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
        StaticSource {
            records: iter.into_iter().map(|(id, r)| (id, r.into())).collect(),
        }
    }
}

impl ElementSource for StaticSource {
    fn fetch(&self, id: u32) -> Result<String, FetchError> {
        self.records.get(&id).cloned().ok_or(FetchError::NotFound(id))
    }
}

/// A multi-record TLE catalog file indexed by catalog number.
///
/// The file is split into records once; records are not validated until
/// fetched and parsed. When a catalog number appears more than once, the
/// last record in the file wins.
#[derive(Debug, Clone)]
pub struct TleFileSource {
    path: Option<PathBuf>,
    index: StaticSource,
}

impl TleFileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FetchError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut source = Self::from_text(&text);
        source.path = Some(path.to_path_buf());
        log::info!("indexed {} element records from {}", source.len(), path.display());
        Ok(source)
    }

    pub fn from_text(text: &str) -> Self {
        let mut index = StaticSource::new();
        for record in tle::split_records(text) {
            match record.catalog_number() {
                Some(id) => {
                    if index.records.contains_key(&id) {
                        log::debug!("catalog {id} appears more than once, keeping the later record");
                    }
                    index.insert(id, record.to_text());
                }
                None => log::debug!("record without a readable catalog number: {:?}", record.line1),
            }
        }
        TleFileSource { path: None, index }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Catalog numbers present, ascending.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.records.keys().copied()
    }
}

impl ElementSource for TleFileSource {
    fn fetch(&self, id: u32) -> Result<String, FetchError> {
        self.index.fetch(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
ISS (ZARYA)
1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927
2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537
1 20580U 90037B   24001.50000000  .00000764  00000-0  34340-4 0  9991
2 20580  28.4700 100.2000 0002500 300.0000  60.0000 15.09000000400006
";

    #[test]
    fn test_file_source_indexes_records() {
        let source = TleFileSource::from_text(CATALOG);
        assert_eq!(source.ids().collect::<Vec<_>>(), vec![20580, 25544]);

        let iss = tle::parse(&source.fetch(25544).unwrap()).unwrap();
        assert_eq!(iss.name(), Some("ISS (ZARYA)"));
        let hst = tle::parse(&source.fetch(20580).unwrap()).unwrap();
        assert_eq!(hst.name(), None);

        assert!(matches!(source.fetch(1), Err(FetchError::NotFound(1))));
    }

    #[test]
    fn test_missing_file() {
        let err = TleFileSource::open("/nonexistent/catalog.tle").unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[test]
    fn test_static_source() {
        let source: StaticSource = [(1, "a"), (2, "b")].into_iter().collect();
        assert_eq!(source.fetch(2).unwrap(), "b");
        assert!(source.fetch(3).is_err());
        assert_eq!(StaticSource::new().with_record(9, "x").len(), 1);
    }
}
