//! API routes module.

pub mod assets;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod users;

pub use routes::create_router;

#[cfg(test)]
mod tests;
