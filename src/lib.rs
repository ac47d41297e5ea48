pub mod audio;
pub mod client;
pub mod controller;
pub mod message;
pub mod osc;
pub mod project;
pub mod settings;
pub mod surface;
pub mod timeline;

pub use client::Client;
pub use controller::init;
