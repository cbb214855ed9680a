mod batch;
mod process;
mod router;

pub use batch::*;
pub use process::*;
pub use router::*;
