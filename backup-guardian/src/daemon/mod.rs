//! Process lifecycle helpers.

pub mod shutdown;

pub use shutdown::ShutdownCoordinator;
