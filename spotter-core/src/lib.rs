pub mod audio;
pub mod config;
pub mod errors;
pub mod live;
pub mod logging;
pub mod models;
pub mod recommendation;
pub mod session;
pub mod workout;

pub use errors::SpotterError;
