//! REST client for the stream backend, cursor lifecycle management, and
//! the roster client. The backend is reached through the `StreamApi` trait
//! so tests can substitute a scripted mock.

#![deny(unsafe_code)]

pub mod client;
pub mod cursor;
pub mod mock;
pub mod roster;

pub use client::{FetchResult, StreamApi, StreamClient};
pub use cursor::CursorManager;
pub use mock::{MockResponse, MockStreamApi};
pub use roster::fetch_roster;
