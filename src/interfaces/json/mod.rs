//! Reading and writing payment models as JSON documents.

pub mod context_reader;
pub mod context_writer;

pub use context_reader::ContextReader;
pub use context_writer::ContextWriter;
