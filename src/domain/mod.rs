mod balance;
mod employee;
mod request;

pub use balance::*;
pub use employee::*;
pub use request::*;
