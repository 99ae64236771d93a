//! HTTP resilience primitives
//!
//! - Circuit breaker for shedding load off a failing endpoint
//! - Token-bucket rate limiter
//!
//! The market-data client threads every request through both.

mod circuit_breaker;
mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use rate_limiter::RateLimiter;
