pub mod morphology;
pub mod preprocessing;
pub mod extraction;
pub mod simplification;

pub use preprocessing::*;
pub use extraction::*;
pub use simplification::*;
