//! # File Reader
//!
//! A small HTTP service for listing, reading, uploading, deleting, and
//! diffing text files in local directories, plus two standalone tools
//! (PDF to markdown, Oracle query).
//!
//! ## Architecture
//!
//! ```text
//!  GET /files/compare
//!         │
//!         ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │     diff     │──▶│    render    │──▶│   artifact   │◀── janitor
//! │ Myers + align│   │ askama HTML  │   │  diff/*.html │   (hourly)
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`diff`] | Unified diff and side-by-side alignment |
//! | [`render`] | HTML page for a diff |
//! | [`artifact`] | Diff artifact store |
//! | [`compare`] | Diff, render, and persist in one step |
//! | [`janitor`] | Background artifact reclamation |
//! | [`files`] | File listing and tolerant text reading |
//! | [`manager`] | Upload, delete, download, metadata listings |
//! | [`server`] | HTTP server |
//! | [`pdf`] | PDF to markdown conversion |
//! | [`dbquery`] | Oracle single-query reader |

pub mod artifact;
pub mod compare;
pub mod config;
pub mod dbquery;
pub mod diff;
pub mod files;
pub mod janitor;
pub mod manager;
pub mod pdf;
pub mod render;
pub mod server;
