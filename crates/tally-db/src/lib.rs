//! # tally-db: Database Layer for Tally
//!
//! Every write to the Tally database goes through this crate. It owns the
//! SQLite pool, the repositories, the stock ledger and the sale
//! coordinator that ties them into atomic units of work.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   SaleCoordinator ──► SaleValidator ──► StockLedger             │   │
//! │  │        │                                    │                   │   │
//! │  │        │ one transaction                    │                   │   │
//! │  │        ▼                                    ▼                   │   │
//! │  │   ┌──────────────┐  ┌──────────────┐  ┌──────────────┐         │   │
//! │  │   │SlipRepository│  │ IncomeLedger │  │ItemRepository│         │   │
//! │  │   └──────────────┘  └──────────────┘  └──────────────┘         │   │
//! │  │                                                                 │   │
//! │  │   Database (pool.rs)          Migrations (embedded)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ── items, slips, slip_lines, income_entries               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and sale error types
//! - [`repository`] - Items, slips and the income ledger
//! - [`stock`] - Stock ledger (resolve, reserve, release, commit, restore)
//! - [`validator`] - Sale validation
//! - [`coordinator`] - Atomic create/cancel sale
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//! use tally_core::{SaleLine, SaleRequest};
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//!
//! let receipt = db
//!     .sales()
//!     .create_sale(SaleRequest::new(vec![SaleLine::new("COLA-330", 2)]))
//!     .await?;
//!
//! db.sales().cancel_sale(&receipt.slip.slip_number).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coordinator;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod stock;
pub mod validator;

// =============================================================================
// Re-exports
// =============================================================================

pub use coordinator::SaleCoordinator;
pub use error::{DbError, DbResult, SaleError, SaleResult};
pub use pool::{Database, DbConfig};
pub use stock::{Reservation, StockLedger};
pub use validator::SaleValidator;

// Repository re-exports for convenience
pub use repository::income::IncomeLedger;
pub use repository::item::ItemRepository;
pub use repository::slip::SlipRepository;
