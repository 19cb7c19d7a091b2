//! Query functions organized by the three things the at-rest contract (§6)
//! asks this crate to hold, plus a small settings table for daemon flags.

pub mod group;
pub mod identity;
pub mod settings;
pub mod trust;
