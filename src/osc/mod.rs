pub mod input;
pub mod output;
pub mod receiver;
pub mod sender;
