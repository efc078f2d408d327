pub mod model;
pub mod source;

pub use model::Profile;
pub use source::{InstanceDirSource, ProfileSource};
