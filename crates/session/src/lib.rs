//! Session store backends for tripclaw.
//!
//! Implementations of the `SessionStore` trait:
//! - **InMemorySessionStore**: process lifetime, used by tests and one-shot runs
//! - **FileSessionStore**: one JSON file per session, atomic replace on write

pub mod file_backend;
pub mod in_memory;
mod slots;

pub use file_backend::FileSessionStore;
pub use in_memory::InMemorySessionStore;
