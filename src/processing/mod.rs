pub mod batch;
pub mod stream;

pub use batch::BatchProcessor;
pub use stream::StreamProcessor;
