#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use omniphotos_geometry as geometry;

#[doc(inline)]
pub use omniphotos_dataset as dataset;
