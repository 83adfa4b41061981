pub mod errors;
pub mod fitness;
pub mod objective;
pub mod point;
pub mod runtime;

pub use errors::*;
pub use fitness::*;
pub use objective::*;
pub use point::*;
pub use runtime::*;
