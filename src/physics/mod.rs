pub mod propagation;
pub mod refraction;

pub use propagation::{RangeBound, RfParameters};
pub use refraction::RefractionParams;
