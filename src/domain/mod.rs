mod balance;
mod expense;
mod money;
mod user;

pub use balance::*;
pub use expense::*;
pub use money::*;
pub use user::*;
