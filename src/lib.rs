//! # gitbored
//!
//! Polls one GitHub account's public activity and keeps a local SQLite
//! history of its repositories and pushed commits.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//! │ Scheduler │──▶│ Ingestor  │──▶│ HttpCache │──▶│  GitHub  │
//! │   loop    │   │ repos +   │   │ ETag +    │   │ REST API │
//! └───────────┘   │ commits   │   │ poll int. │   └──────────┘
//!                 └─────┬─────┘   └───────────┘
//!                       ▼
//!                 ┌───────────┐
//!                 │  SQLite   │
//!                 │ repos,    │
//!                 │ commits   │
//!                 └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! echo "octo:ghp_xxx" > ~/.gitbored/API_AUTH
//! gitbored init
//! gitbored sync        # one cycle
//! gitbored daemon      # poll every schedule.interval_secs
//! gitbored stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`credentials`] | Auth file loading |
//! | [`connector_github`] | `reqwest` transport and endpoint URLs |
//! | [`http_cache`] | Conditional GET cache honoring `X-Poll-Interval` |
//! | [`normalize`] | Nested JSON → flat path-keyed map |
//! | [`ingest`] | Repository and commit sync |
//! | [`scheduler`] | Fixed-interval cycle loop |
//! | [`store`] | Storage trait and in-memory implementation |
//! | [`sqlite_store`] | SQLite storage |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`stats`] | Database summary |
//! | [`logging`] | Tracing subscriber setup |
//! | [`pidfile`] | Daemon single-instance guard |

pub mod config;
pub mod connector_github;
pub mod credentials;
pub mod db;
pub mod error;
pub mod http_cache;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod pidfile;
pub mod scheduler;
pub mod sqlite_store;
pub mod stats;
pub mod store;
