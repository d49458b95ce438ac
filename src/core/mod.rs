pub mod audio;
pub mod input;
pub mod midi;
