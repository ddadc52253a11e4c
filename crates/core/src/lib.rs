#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod time;
pub mod unlock;

pub use error::Error;
pub use time::Clock;
