pub mod avatar;
pub mod connections;
pub mod messages;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;
