pub mod address;
pub mod config;
pub mod constants;
pub mod geo;
pub mod map;
pub mod tier;
pub mod viewport;
