pub mod features;
pub mod layer;
pub mod symbology;
pub mod theme;

pub use features::*;
pub use layer::*;
pub use symbology::*;
pub use theme::*;
