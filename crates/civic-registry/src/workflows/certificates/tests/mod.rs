mod common;
mod gate;
