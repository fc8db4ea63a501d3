pub mod args;
pub mod build;
pub mod camera;
pub mod dispatch;
pub mod encoder;
pub mod error;
pub mod report;
pub mod resolver;
pub mod upload;

pub use error::{Error, Result};
