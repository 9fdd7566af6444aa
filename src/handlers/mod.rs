// handlers/mod.rs - Handler tiers
//
// Public (no auth) → Protected (JWT auth, scope-checked per request)
pub mod public;    // No authentication required (/health)
pub mod protected; // JWT authentication required (DELETE /[:database[/:resource]])

pub use public::*;
pub use protected::*;
