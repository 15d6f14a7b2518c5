//! Typed, bidirectional header codecs.
//!
//! # Data Flow
//! ```text
//! HeaderMap ──► HeaderType<T>::read ──► Ok(Some(T)) | Ok(None) absent | Err(DecodingError)
//!      ▲
//!      └─────── HeaderType<T>::write ◄── &T   (replace, or append when multi-valued)
//! ```
//!
//! # Design Decisions
//! - Absence and malformation are distinct: callers get `Ok(None)` for a
//!   missing header and `Err` for one that is present but unreadable.
//! - Variants of one header (strict/lax cookies) live in the
//!   [`HeaderRegistry`] and are resolved once at startup.
//! - Multi-valued headers never decode to "absent" when present; an empty
//!   list is returned instead.

pub mod codec;
pub mod cookie;
pub mod date;
pub mod registry;
pub mod standard;

pub use codec::{HeaderCodec, HeaderType, ListCodec, MethodCodec, NumberCodec, TextCodec};
pub use cookie::{Cookie, CookieCodec, SameSite, SetCookie, SetCookieCodec};
pub use date::HttpDateCodec;
pub use registry::{HeaderRegistry, HeaderRegistryBuilder, RegistryError};
pub use standard::*;
