pub mod board;
pub mod check;
pub mod grid;
pub mod serve;
pub mod stats;
