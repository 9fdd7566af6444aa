// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here sits behind jwt_auth_middleware, which injects the caller's
// Principal. Handlers still check the per-database scope themselves.
pub mod delete;

pub use delete::delete;
