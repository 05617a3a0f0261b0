//!  Storage is organized through [store::FileStore].
//!  The basic idea is:
//!   - There is a directory with all the persisted state.
//!   - Every piece of state lives under its own key, one JSON file per key.
//!   - Activity is stored as spans: one record per contiguous use of an application.

pub mod entities;
pub mod store;
