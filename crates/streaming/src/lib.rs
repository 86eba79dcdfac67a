pub mod collaborators;
pub mod http;
pub mod memory;
pub mod protocol;

pub use collaborators::*;
pub use http::*;
pub use memory::*;
