//! Domain models owned by the client.

pub mod cart;
pub mod user;

pub use cart::{CartLine, CartSnapshot, CatalogRef, SizeRef};
pub use user::{Identity, LoginOutcome, UserPatch, UserRecord};
