pub mod auth;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod service;
pub mod todos;
pub mod token;
pub mod users;
