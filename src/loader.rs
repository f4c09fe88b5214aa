use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;

use crate::predictor::{PredictError, Predictor};
use crate::table::{ReferenceTable, TableError, TableKind, TableStore};
use crate::value::TimeConvention;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("timeout fetching {0}")]
    Timeout(String),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("failed to start loader runtime: {0}")]
    Runtime(std::io::Error),
}

/// Where a reference table comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    File(PathBuf),
    Url(String),
}

impl TableSource {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            TableSource::Url(location.to_string())
        } else {
            TableSource::File(PathBuf::from(location))
        }
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        match self {
            TableSource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| LoadError::Io {
                        path: path.clone(),
                        source,
                    })
            }
            TableSource::Url(url) => {
                let http = |source: reqwest::Error| LoadError::Http {
                    url: url.clone(),
                    source,
                };
                let response = timeout(FETCH_TIMEOUT, reqwest::get(url))
                    .await
                    .map_err(|_| LoadError::Timeout(url.clone()))?
                    .map_err(http)?;
                if !response.status().is_success() {
                    return Err(LoadError::Status {
                        url: url.clone(),
                        status: response.status(),
                    });
                }
                response.text().await.map_err(http)
            }
        }
    }
}

impl fmt::Display for TableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSource::File(path) => write!(f, "{}", path.display()),
            TableSource::Url(url) => f.write_str(url),
        }
    }
}

async fn load_table(kind: TableKind, source: &TableSource) -> Result<ReferenceTable, LoadError> {
    let text = source.fetch().await?;
    let table = ReferenceTable::from_csv_str(kind, &text)?;
    if table.is_empty() {
        log::warn!("[LOAD] {} table from {} has no rows", kind, source);
    } else {
        log::info!("[LOAD] {} table: {} rows from {}", kind, table.len(), source);
    }
    Ok(table)
}

/// Fetch and parse both tables concurrently.
pub async fn load_store(short: &TableSource, long: &TableSource) -> Result<TableStore, LoadError> {
    let (short, long) = tokio::try_join!(
        load_table(TableKind::Short, short),
        load_table(TableKind::Long, long)
    )?;
    Ok(TableStore::new(short, long))
}

#[derive(Debug, Clone)]
pub enum LoadState {
    Loading,
    Ready(Arc<TableStore>),
    Failed(String),
}

/// Loads the reference tables in the background and hands out predictors
/// once both are in.
pub struct TableLoader {
    short: TableSource,
    long: TableSource,
    state: Arc<Mutex<LoadState>>,
}

impl TableLoader {
    pub fn new(short: TableSource, long: TableSource) -> Self {
        Self {
            short,
            long,
            state: Arc::new(Mutex::new(LoadState::Loading)),
        }
    }

    /// Start loading on a background thread.
    pub fn start(&self) {
        *lock(&self.state) = LoadState::Loading;

        let state = self.state.clone();
        let (short, long) = (self.short.clone(), self.long.clone());
        std::thread::spawn(move || {
            let result = tokio::runtime::Runtime::new()
                .map_err(LoadError::Runtime)
                .and_then(|rt| rt.block_on(load_store(&short, &long)));

            let next = match result {
                Ok(store) => {
                    log::info!("[LOAD] Reference tables ready");
                    LoadState::Ready(Arc::new(store))
                }
                Err(e) => {
                    log::warn!("[LOAD] Failed to load reference tables: {}", e);
                    LoadState::Failed(e.to_string())
                }
            };
            *lock(&state) = next;
        });
    }

    /// Load again after a failure. Does nothing while loading or once ready.
    pub fn retry(&self) -> bool {
        if matches!(self.state(), LoadState::Failed(_)) {
            log::info!("[LOAD] Retrying table load");
            self.start();
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> LoadState {
        lock(&self.state).clone()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state(), LoadState::Loading)
    }

    pub fn predictor(&self, convention: TimeConvention) -> Result<Predictor, PredictError> {
        match self.state() {
            LoadState::Ready(store) => Ok(Predictor::new(store, convention)),
            LoadState::Loading | LoadState::Failed(_) => Err(PredictError::DataNotLoaded),
        }
    }

    /// Block until loading finishes or `limit` passes, returning the final state.
    pub fn wait(&self, limit: Duration) -> LoadState {
        let start = Instant::now();
        loop {
            let state = self.state();
            if !matches!(state, LoadState::Loading) || start.elapsed() >= limit {
                return state;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

fn lock(state: &Mutex<LoadState>) -> MutexGuard<'_, LoadState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
