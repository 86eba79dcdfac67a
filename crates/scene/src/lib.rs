pub mod device;
pub mod location;
pub mod spatial;

pub use device::*;
pub use location::*;
pub use spatial::*;
