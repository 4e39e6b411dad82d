//! # dynjson-value
//!
//! A uniformly-typed dynamic JSON value.
//!
//! A [`Json`] handle represents any of the six JSON kinds and exposes the
//! whole navigation/mutation surface on a single type; operations that do
//! not apply to the receiver's kind return an error instead of being
//! unrepresentable. Values keep a non-owning back-reference to their
//! enclosing container, so a child can always find its way [`up`](Json::up)
//! the tree.
//!
//! The crate also contains the tolerant text reader ([`read`]), the
//! escaping writer behind [`Json`]'s `Display` impl, and the structural
//! merge engine ([`Json::with`]).
mod error;
mod factory;
mod merge;
mod number;
mod read;
mod value;
mod write;

pub use error::Error;
pub use factory::{
    attach_factory, detach_factory, factory, set_global_factory, DefaultFactory, Factory,
};
pub use number::Number;
pub use read::read;
pub use value::{Json, Kind};

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;
