//! Service implementations
//!
//! Real implementations of the worker traits. These are the production
//! implementations that handle actual process I/O.

pub mod managed_process;
pub mod output_handler;
pub mod process_factory;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use managed_process::ManagedProcess;
pub use process_factory::RealWorkerFactory;
