pub mod play;

pub mod utils;
