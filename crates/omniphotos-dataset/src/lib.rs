#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Cache folder serialization of preprocessed datasets.
pub mod cache;

/// A preprocessed dataset in memory.
pub mod dataset;

/// Discovery of the datasets available under a root folder.
pub mod discovery;

/// Optical flow file naming and computation contract.
pub mod flow;

/// Double-buffered background loading of datasets.
pub mod loader;

/// The preprocessing pipeline from SfM output to cache folder.
pub mod preprocess;

/// User interaction needed by the cache and preprocessing stages.
pub mod prompt;

/// Per-dataset YAML configuration.
pub mod settings;

pub use dataset::Dataset;
pub use prompt::Prompt;
pub use settings::Settings;
