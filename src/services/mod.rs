//! Services separating I/O and output handling from the processor

pub mod format;
pub mod io;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
