//! # Repository Module
//!
//! Table-level access for Tally.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repository          Table(s)                 Writes                    │
//! │  ──────────────────  ───────────────────────  ──────────────────────    │
//! │  ItemRepository      items                    catalog CRUD (pool)       │
//! │  SlipRepository      slips, slip_lines        *_in(conn) in a sale unit │
//! │  IncomeLedger        income_entries           *_in(conn) in a sale unit │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions ending in `_in` take the caller's connection so they can join
//! the coordinator's transaction. Stock quantities are never written here;
//! that is the [`crate::stock::StockLedger`]'s job.

pub mod income;
pub mod item;
pub mod slip;
