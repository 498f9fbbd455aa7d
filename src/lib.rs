pub mod error;
pub mod geo;
pub mod geometry;
pub mod physics;
pub mod lob;
pub mod fix;
pub mod io;

pub use error::{FixError, GeoError, GridError};
pub use fix::{Classification, FixResolver, TargetEstimate, resolve};
pub use geo::Coordinate;
pub use lob::{LobEnvelope, SensorId, SensorReport};
pub use physics::RfParameters;
