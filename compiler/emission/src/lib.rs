pub use emission::*;

mod emission;
