pub mod composite;
pub mod registry;
pub mod traits;
pub mod types;

pub use composite::*;
pub use registry::*;
pub use traits::*;
pub use types::*;
