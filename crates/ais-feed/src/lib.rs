pub mod backoff;
pub mod client;
pub mod feed_worker;
pub mod queue;
pub mod transport;

pub use backoff::*;
pub use client::*;
pub use feed_worker::*;
pub use queue::*;
pub use transport::*;
