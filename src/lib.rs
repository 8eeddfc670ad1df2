pub mod catalog;
pub mod config;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod metrics;
pub mod model;
pub mod observability;
pub mod split;
pub mod tree;

pub use config::PipelineConfig;
pub use error::{MushError, Result};
pub use model::{Edibility, MushroomModel};
