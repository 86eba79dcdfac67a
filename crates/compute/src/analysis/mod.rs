pub mod proximity;
pub mod statistics;
