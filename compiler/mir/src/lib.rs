pub use print_tacky::print_tacky;
pub use tacky_gen::gen_tacky;

pub mod tacky;
mod print_tacky;
mod tacky_gen;
