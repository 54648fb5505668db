//! # Worksheet Store
//!
//! A paginated, searchable REST API over a schema-less collection of
//! generated worksheets, plus a terminal client that renders their rich-text
//! content.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────┐
//! │   Query    │──▶│ DocumentStore│──▶│ Normalize  │──▶│ Envelope │
//! │  Builder   │   │ SQLite/JSON  │   │ raw → typed│   │ + paging │
//! └────────────┘   └──────────────┘   └────────────┘   └────┬─────┘
//!                                                           │
//!                          ┌────────────────────────────────┤
//!                          ▼                                ▼
//!                    ┌──────────┐                     ┌──────────┐
//!                    │   HTTP   │ ◀──── JSON ──────── │  Client  │
//!                    │  (axum)  │                     │  (wks)   │
//!                    └──────────┘                     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wks init                        # create database
//! wks import worksheets.jsonl     # load raw documents
//! wks serve                       # start HTTP server
//! wks list --search algebra       # browse from another terminal
//! wks show 1                      # render the first entry
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Identifiers, records, envelope, wire shape |
//! | [`normalize`] | Raw document → [`models::WorksheetRecord`] |
//! | [`query`] | Paging/search parameters → filter, sort, window |
//! | [`store`] | Document store trait and backends |
//! | [`retrieval`] | List/detail/subject/recent/delete operations |
//! | [`server`] | REST API |
//! | [`client`] | HTTP client and list/detail views |
//! | [`render`] | Untrusted rich text → terminal text |
//! | [`ingest`] | Bulk import |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod query;
pub mod render;
pub mod retrieval;
pub mod server;
pub mod store;
