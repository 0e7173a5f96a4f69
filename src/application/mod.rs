pub mod accounts;
pub mod error;
pub mod passwords;
pub mod posts;
pub mod repos;
pub mod session;
pub mod users;
