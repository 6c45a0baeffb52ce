pub use frame::*;
pub use lir_def::*;

mod frame;
mod lir_def;
