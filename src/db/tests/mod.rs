//! Shared database repository test infrastructure
//!
//! Runs the same test logic against both the SQLite and PostgreSQL annotation
//! stores:
//!
//! - **Unit tests (SQLite)**: Fast, in-memory tests that run with every `cargo test`
//! - **Integration tests (PostgreSQL)**: Slower tests using testcontainers, run with
//!   `cargo test -- --ignored`
//!
//! Shared test functions take a context of `&dyn AnnotationRepo` and
//! `&dyn TagRepo`; each backend gets a macro that builds the context and
//! calls them.
//!
//! # Running tests
//!
//! ```bash
//! cargo test                       # Run fast SQLite tests only
//! cargo test -- --ignored          # Run PostgreSQL integration tests (requires Docker)
//! cargo test -- --include-ignored  # Run all tests
//! ```

mod annotations;
