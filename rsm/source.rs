// ========================================================================================
//
//                         EXPERIMENT SOURCES AND LOAD CACHE
//
// ========================================================================================
//
// Raw tables are fetched from a local path or an `http(s)` URL. Fetching is the only
// slow step of the pipeline, so parsed tables are memoized per source identifier in
// an explicit `ExperimentCache`. The cache owns its fetcher, which keeps it easy to
// swap in a counting or failing fetcher under test.
//
// Failed loads are never cached; calling again retries.

use crate::data::{DataSourceError, ExperimentData, parse_experiment_csv};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

/// Published dataset of the aloesin extraction study.
pub const DEFAULT_SOURCE_URL: &str = "https://raw.githubusercontent.com/mikel-ao/aloe-extraction-optimization/refs/heads/main/ccd_aloe.csv";

/// Timeout applied to HTTP fetches.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces the raw bytes of an experiment table.
pub trait DataFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, DataSourceError>;
}

/// Reads tables from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl DataFetcher for FileFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, DataSourceError> {
        fs::read(source).map_err(|error| DataSourceError::IoError {
            source_id: source.to_string(),
            error,
        })
    }
}

/// Downloads tables over HTTP(S).
#[derive(Debug, Clone, Copy)]
pub struct HttpFetcher {
    pub timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            timeout: HTTP_TIMEOUT,
        }
    }
}

impl DataFetcher for HttpFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, DataSourceError> {
        let response = ureq::get(source)
            .timeout(self.timeout)
            .call()
            .map_err(|e| DataSourceError::FetchFailed {
                source_id: source.to_string(),
                reason: e.to_string(),
            })?;

        if response.status() != 200 {
            return Err(DataSourceError::FetchFailed {
                source_id: source.to_string(),
                reason: format!("HTTP {}: {}", response.status(), response.status_text()),
            });
        }

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|error| DataSourceError::IoError {
                source_id: source.to_string(),
                error,
            })?;
        Ok(bytes)
    }
}

/// Dispatches on the source identifier: URLs go over HTTP, everything else is a path.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceFetcher {
    pub file: FileFetcher,
    pub http: HttpFetcher,
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

impl DataFetcher for SourceFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, DataSourceError> {
        if is_remote(source) {
            self.http.fetch(source)
        } else {
            self.file.fetch(source)
        }
    }
}

/// Memoizes parsed experiment tables by source identifier for the lifetime of the value.
pub struct ExperimentCache<F: DataFetcher = SourceFetcher> {
    fetcher: F,
    entries: HashMap<String, Arc<ExperimentData>>,
}

impl Default for ExperimentCache<SourceFetcher> {
    fn default() -> Self {
        Self::new(SourceFetcher::default())
    }
}

impl<F: DataFetcher> ExperimentCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached table for `source`, fetching and parsing it on first use.
    pub fn load(&mut self, source: &str) -> Result<Arc<ExperimentData>, DataSourceError> {
        if let Some(data) = self.entries.get(source) {
            log::debug!("Experiment data for '{source}' served from cache.");
            return Ok(Arc::clone(data));
        }

        log::info!("Fetching experiment data from '{source}'");
        let bytes = self.fetcher.fetch(source)?;
        let data = Arc::new(parse_experiment_csv(bytes)?);
        log::info!("Loaded {} experimental runs from '{source}'.", data.len());

        self.entries.insert(source.to_string(), Arc::clone(&data));
        Ok(data)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}
