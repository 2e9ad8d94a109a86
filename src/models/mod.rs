pub mod driver;
pub mod earning;
pub mod session;
pub mod settings;
pub mod transaction;
pub mod user;
