mod client;
mod digest;
mod error;
mod logger;
mod protocol;
pub mod quirks;
mod sensors;
mod types;

pub use client::{ColorTouchClient, ColorTouchClientBuilder, Protocol, Session, DEFAULT_TIMEOUT};
pub use error::{Error, ErrorKind, Result};
pub use logger::MessageLogMode;
pub use protocol::MIN_API_VER;
pub use types::*;
