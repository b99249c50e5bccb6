//! In-process publish/subscribe for committed store mutations.
//!
//! # Responsibility
//! - Keep listener registrations per channel.
//! - Fan out `StoreEvent`s synchronously to current listeners.
//!
//! # Invariants
//! - The registry is an explicit value; there is no process-global bus.
//! - A listener panic never prevents delivery to the remaining listeners.

pub mod bus;
