//! Default collaborator implementations.
//!
//! Each of these is the stock implementation of one contract from
//! [`courier_core::contract`]; any of them can be replaced on the client
//! without touching the others.

mod decoder;
mod mapper;
mod resolver;
mod serializer;
mod transport;

pub use decoder::DefaultResponseDecoder;
pub use mapper::DefaultErrorMapper;
pub use resolver::{DefaultUrlResolver, QuerySerializerFn};
pub use serializer::DefaultBodySerializer;
pub use transport::HttpTransport;
