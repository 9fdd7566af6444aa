// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Middleware: CORS and request tracing only
pub mod health;

pub use health::health;
