//! # Session Management
//!
//! Maps a per-user session identifier to its conversation history.
//!
//! ## Key Components:
//! - **SessionStore**: async trait with last-writer-wins `get`/`put` semantics
//! - **MemorySessionStore**: process-local map with idle expiry
//! - **FileSessionStore**: one JSON file per session under a directory
//! - **SessionLocks**: optional per-session mutex for serializing requests
//! - **cookie**: reading and issuing the session id cookie

pub mod cookie;
pub mod filesystem;
pub mod locks;
pub mod memory;
pub mod store;

pub use cookie::{SessionCookie, SessionId};
pub use filesystem::FileSessionStore;
pub use locks::SessionLocks;
pub use memory::MemorySessionStore;
pub use store::SessionStore;
