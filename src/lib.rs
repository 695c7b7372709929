pub mod bot;
pub mod notifications;
pub mod server;
pub mod store;
pub mod web;
