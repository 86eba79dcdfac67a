pub mod event_bus;
pub mod lifecycle;
pub mod notice;
pub mod sequence;

pub use event_bus::*;
pub use lifecycle::*;
pub use notice::*;
pub use sequence::*;
