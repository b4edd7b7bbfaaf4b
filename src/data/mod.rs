pub mod image;
pub mod loader;
pub mod synthetic;
pub mod transformer;

pub use self::image::*;
pub use loader::*;
pub use synthetic::*;
pub use transformer::*;
