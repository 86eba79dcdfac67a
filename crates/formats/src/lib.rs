pub mod device_feed;

pub use device_feed::*;
