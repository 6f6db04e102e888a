pub mod config;
pub mod geometry;
pub mod io;
pub mod stream;
pub mod system;
pub mod tracking;

#[cfg(test)]
mod test_utils;
