//! Mock query invoker for testing without spawning processes.

mod invoker;
mod scenarios;

pub use invoker::{MockInvoker, MockResponse};
