//! Bookmarks Module
//!
//! Titled URLs with an optional description and an ordered list of free-form
//! tags. Tags live in their own table, one row per position, so a bookmark can
//! carry the same tag twice and keeps the order it was given.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bookmarkhub::bookmarks;
//!
//! // Mount the routes
//! let app = Router::new()
//!     .merge(bookmarks::routes())
//!     .with_state(app_state);
//!
//! // Use the store directly
//! let session = db.session()?;
//! let bookmark = bookmarks::Bookmarks::new(&session).create(input).await?;
//! ```

mod handler;
mod routes;
mod store;

pub use routes::routes;
pub use store::Bookmarks;
