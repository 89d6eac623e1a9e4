//! Image fetch layer: downloads complaint photos for the detector.

mod fetcher;

pub use fetcher::{FetchError, FetchedImage, ImageFetcher};
