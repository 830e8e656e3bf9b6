pub mod config;
pub mod conflicts;
pub mod data;
pub mod error;
pub mod hill_climbing;
pub mod mcts;
pub mod model;
pub mod server;
pub mod sink;
pub mod solver;
pub mod timetable;
pub mod tree;

pub use config::SolverConfig;
pub use data::{ProblemInput, SolveOutput, StopReason};
pub use error::SolveError;
pub use solver::{solve, solve_with};
