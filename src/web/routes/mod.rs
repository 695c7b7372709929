pub mod message_routes;

pub use message_routes::create_message_router;
