// Library root: modules are public so the binary and the integration tests
// share one API.

pub mod auction;
pub mod config;
pub mod db;
pub mod harvest;
pub mod stats;
