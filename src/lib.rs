pub mod app;
pub mod cmd;
pub mod errors;
pub mod fx;
pub mod log;
pub mod market;
pub mod portfolio;
pub mod tracing;
pub mod util;

extern crate lazy_static;

#[cfg(any(test, feature = "testlib"))]
pub mod testlib;
