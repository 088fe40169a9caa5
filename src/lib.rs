pub mod codec;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod error;
pub mod parser;
pub mod scanner;
pub mod value;

pub use codec::RespDecoder;
pub use config::Limits;
pub use connection::Connection;
pub use decoder::Decoder;
pub use error::{Error, ProtocolError, Result, StreamError};
pub use value::{Kind, Value};
