pub mod cycle;
pub mod dashboard;
pub mod proxy;

pub use cycle::*;
pub use dashboard::*;
pub use proxy::*;
