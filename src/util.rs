pub mod basic;
pub mod date;
pub mod decimal;
pub mod fetch;
pub mod math;
pub mod rw;

pub mod os;
