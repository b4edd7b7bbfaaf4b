//! Rigid alignment of sampled 2D/3D images: translation, in-plane rotation
//! and mirror recovery against a reference, scored by pluggable
//! comparators and dispatched by name through [`AlignerRegistry`].

pub mod algorithms;
pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod visualization;

pub use data::{Attribute, Image, ImageTransformer, SyntheticImage, ALIGNMENT_TRANSFORM_KEY};
pub use error::{AlignError, Result};
pub use pipeline::{
    AlgorithmConfig, Aligner, AlignerRegistry, Alignment, AlignmentReport, Comparator, Comparison,
    ParameterInfo, Transform,
};
