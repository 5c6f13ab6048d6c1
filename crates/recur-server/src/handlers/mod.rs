//! Route handlers: `health` is open, `transactions` sits behind auth

pub mod health;
pub mod transactions;

pub use health::*;
pub use transactions::*;
