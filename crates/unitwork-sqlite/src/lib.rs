//! SQLite session provider for `unitwork`.
//!
//! Backs each scope's session with one pooled `rusqlite` connection holding
//! an open transaction for the session's whole life.
//!
//! # Design decisions
//!
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management; a session checks a connection out at creation and
//!   hands it back at close.
//! - **WAL mode by default**: concurrent readers with a single writer,
//!   which matches the one-writer-per-scope access pattern. Disable with
//!   the `wal` provider option for databases that cannot use it.
//! - **Transaction per session**: `BEGIN` runs at session creation and the
//!   scope's finalization issues the matching `COMMIT`/`ROLLBACK`, so
//!   everything a scope does is one atomic unit.
//! - **Strict option vocabulary**: provider options (`busy_timeout_ms`,
//!   `pool_max_size`, `wal`, `foreign_keys`) and session options
//!   (`behavior`, `query_only`) are fixed sets; anything else is rejected
//!   by name at construction time.

mod pool;
mod provider;
mod session;
mod settings;

pub use pool::{DbPool, PoolError};
pub use provider::SqliteProvider;
pub use session::{SqliteSession, SqliteSessionExt};
pub use settings::{SqliteProviderSettings, SqliteSessionSettings, TransactionBehavior};
