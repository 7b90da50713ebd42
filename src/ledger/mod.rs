//!  The ledger is organized through [storage::LedgerStorageImpl].
//!  The basic idea is:
//!   - There is one comma separated file with a row per calendar day and a column per title.
//!   - Saving a session adds its duration into the (today, title) cell.
//!   - Every save rereads and rewrites the whole file under a lock shared by all writers.

pub mod storage;
pub mod table;
