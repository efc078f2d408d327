pub mod bundler;

pub use bundler::{bundle_zip, extract_zip};
