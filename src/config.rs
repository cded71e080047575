//! Runtime tuning knobs read once at startup.
//!
//! The CLI flags in `spec.md` §6 are the only user-facing configuration
//! surface; the two environment variables here tune cache sizes that the
//! spec leaves as an implementation detail ("suggested >= 4 entries
//! each").

const DEFAULT_CACHE_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub pack_cache_capacity: usize,
    pub delta_cache_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            pack_cache_capacity: read_capacity("PACKTREE_PACK_CACHE"),
            delta_cache_capacity: read_capacity("PACKTREE_DELTA_CACHE"),
        }
    }
}

fn read_capacity(var: &str) -> usize {
    match std::env::var(var) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(n) if n > 0 => n,
            Ok(_) => {
                tracing::warn!(var, "cache capacity must be positive, using default");
                DEFAULT_CACHE_CAPACITY
            }
            Err(_) => {
                tracing::warn!(var, raw, "could not parse cache capacity, using default");
                DEFAULT_CACHE_CAPACITY
            }
        },
        Err(_) => DEFAULT_CACHE_CAPACITY,
    }
}
