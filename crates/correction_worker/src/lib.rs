pub mod correction_worker;
pub mod domain;

pub use correction_worker::*;
pub use domain::*;
