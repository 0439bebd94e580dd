pub mod alert;
pub mod error;
pub mod hash;
pub mod source;
pub mod store;
pub mod time;
