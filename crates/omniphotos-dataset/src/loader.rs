use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    cache::{self, CacheError},
    dataset::Dataset,
    prompt::Prompt,
    settings::Settings,
};

/// Error types for the background loader.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// A load is already in progress
    #[error("A dataset is already being loaded")]
    Busy,

    /// The worker thread ended without sending a result
    #[error("The loading thread stopped unexpectedly")]
    WorkerDisconnected,

    /// The cache could not be loaded
    #[error(transparent)]
    CacheError(#[from] CacheError),
}

/// Where the loader is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing requested or the last result was taken.
    Empty,
    /// A worker thread is reading a cache.
    Loading,
    /// A result is waiting to be taken.
    ReadyToSwap,
}

type LoadResult = Result<Dataset, LoaderError>;

/// Loads datasets from their cache on a background thread.
///
/// The dataset in use stays untouched while the next one loads. The owner polls
/// the loader, typically once per frame, and swaps in the new dataset once it is
/// ready. At most one load runs at a time.
///
/// Example:
///
/// ```no_run
/// use omniphotos_dataset::{loader::DatasetLoader, prompt::FixedAnswer, Settings};
///
/// let settings = Settings::from_file("Dataset/Config/dataset-viewer.yaml").unwrap();
/// let mut loader = DatasetLoader::new();
/// loader.request(settings, Box::new(FixedAnswer(false))).unwrap();
/// let dataset = loader.wait().unwrap();
/// println!("loaded {} cameras", dataset.cameras.len());
/// ```
#[derive(Default)]
pub struct DatasetLoader {
    receiver: Option<mpsc::Receiver<LoadResult>>,
    handle: Option<JoinHandle<()>>,
    result: Option<LoadResult>,
}

impl DatasetLoader {
    /// Create an idle loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start loading the dataset of `settings` on a new thread.
    ///
    /// # Errors
    ///
    /// [`LoaderError::Busy`] if a load is in progress or a result has not been taken.
    pub fn request(
        &mut self,
        settings: Settings,
        mut prompt: Box<dyn Prompt + Send>,
    ) -> Result<(), LoaderError> {
        if self.state() != LoadState::Empty {
            return Err(LoaderError::Busy);
        }

        let (tx, rx) = mpsc::channel();
        log::info!("Loading dataset {}", settings.config_path.display());
        let handle = thread::spawn(move || {
            let result = cache::load_from_cache(&settings, &mut prompt).map_err(LoaderError::from);
            if tx.send(result).is_err() {
                log::debug!("Dataset loader dropped before the load finished");
            }
        });

        self.receiver = Some(rx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Check for a finished load without blocking.
    pub fn poll(&mut self) -> LoadState {
        if let Some(rx) = &self.receiver {
            match rx.try_recv() {
                Ok(result) => self.finish(result),
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.finish(Err(LoaderError::WorkerDisconnected))
                }
            }
        }
        self.state()
    }

    /// Block until the current load is done and take its result.
    ///
    /// Returns [`LoaderError::WorkerDisconnected`] if nothing was requested.
    pub fn wait(&mut self) -> LoadResult {
        if let Some(rx) = self.receiver.take() {
            let result = rx.recv().unwrap_or(Err(LoaderError::WorkerDisconnected));
            self.finish(result);
        }
        self.result.take().unwrap_or(Err(LoaderError::WorkerDisconnected))
    }

    /// Like [`DatasetLoader::wait`], giving up after `timeout`.
    ///
    /// Returns `None` if the load is still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<LoadResult> {
        if let Some(rx) = &self.receiver {
            match rx.recv_timeout(timeout) {
                Ok(result) => self.finish(result),
                Err(mpsc::RecvTimeoutError::Timeout) => return None,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    self.finish(Err(LoaderError::WorkerDisconnected))
                }
            }
        }
        self.take()
    }

    /// Take the result of a finished load, resetting the loader to [`LoadState::Empty`].
    pub fn take(&mut self) -> Option<LoadResult> {
        self.result.take()
    }

    /// The current state, without checking the worker.
    pub fn state(&self) -> LoadState {
        if self.result.is_some() {
            LoadState::ReadyToSwap
        } else if self.receiver.is_some() {
            LoadState::Loading
        } else {
            LoadState::Empty
        }
    }

    fn finish(&mut self, result: LoadResult) {
        self.receiver = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Dataset loading thread panicked");
            }
        }
        if let Err(e) = &result {
            log::error!("Loading the dataset failed: {}", e);
        }
        self.result = Some(result);
    }
}

impl Drop for DatasetLoader {
    fn drop(&mut self) {
        // let a running load finish before the loader goes away
        self.receiver = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
