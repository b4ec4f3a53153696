pub mod beat;
pub mod card;
pub mod config;
pub mod ids;
pub mod project;
pub mod registry;

pub use beat::*;
pub use card::*;
pub use config::*;
pub use ids::*;
pub use project::*;
pub use registry::*;
