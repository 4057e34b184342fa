//! Trellis Core: graph model, output framing and snapshot fan-out

pub mod model;
pub mod framer;
pub mod cache;
pub mod events;
pub mod error;


pub use model::{Node, Graph, GraphSnapshot};
pub use framer::{StreamDocumentFramer, decode};
pub use cache::GraphCache;
pub use events::{Broadcaster, GraphEvent, EVENT_CAPACITY};
pub use error::{ParseError, RecomputeError};
