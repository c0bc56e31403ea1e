//! # Repository Module
//!
//! Repository implementations for database operations.
//!
//! Each repository owns the SQL for one aggregate:
//! - [`product`] - products + stock movement trail
//! - [`member`] - members + balance movement trail
//! - [`transaction`] - transactions + line items
//!
//! Methods taking `&mut SqliteConnection` are unit-of-work primitives: the
//! engines call them on a single open transaction so a settlement or refund
//! commits or rolls back as a whole.

pub mod member;
pub mod product;
pub mod transaction;
