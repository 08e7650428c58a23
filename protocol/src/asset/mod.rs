//! # Asset Model
//!
//! The two kinds of ledger state the redemption flow touches, and the one
//! transition it performs on them.
//!
//! ```text
//! stamp.rs   — Stamp: a single-use voucher issued by a farm
//! basket.rs  — Basket: a transferable basket of apples with an owner
//! state.rs   — LedgerState sum type, StateRef, StateAndRef
//! ```
//!
//! The ledger is append-only. Nothing here mutates a state in place: a
//! change of owner produces a new [`Basket`] value which a transaction then
//! records as an output, while the old one is consumed as an input.

pub mod basket;
pub mod stamp;
pub mod state;

pub use basket::Basket;
pub use stamp::Stamp;
pub use state::{LedgerState, StateAndRef, StateKind, StateRef};
