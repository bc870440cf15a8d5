//! # switchboard
//!
//! Workspace root. No business logic lives here — it exists to host the
//! end-to-end integration tests and latency benchmark in `tests/` that
//! exercise the workspace crates together the way a real deployment would.
//!
//! See `switchboard-shared`, `switchboard-transport`, `switchboard-mediator`,
//! and `switchboard-saga` for the actual implementation.

// Intentionally empty: dependencies live in [dev-dependencies] so the
// integration tests under tests/ can exercise the workspace crates
// without creating a circular dependency back into this package.
