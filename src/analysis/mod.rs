pub mod benchmarks;
pub mod comparators;
pub mod metrics;

pub use benchmarks::*;
pub use comparators::*;
pub use metrics::*;
