//! # Context Docs
//!
//! Track small markdown "context documents" that describe parts of a
//! codebase, keep their checksums in a registry, and surface the ones that
//! apply to a given file.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌────────────┐
//! │   scan   │──▶│ frontmatter │──▶│  registry  │  project: .ctx/registry.yml
//! │ (globs)  │   │  + document │   │   (YAML)   │  global:  ~/.ctx-global/
//! └──────────┘   └─────────────┘   └─────┬──────┘
//!                                        │
//!                  ┌─────────────────────┼──────────────────┐
//!                  ▼                     ▼                  ▼
//!            ┌───────────┐        ┌─────────────┐    ┌──────────┐
//!            │   sync    │        │  freshness  │    │  target  │
//!            │ (writes)  │        │ (read-only) │    │ + search │
//!            └───────────┘        └─────────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ctx init                          # create .ctx/registry.yml
//! ctx create src/auth.ctx.md --target src/auth.rs --keywords auth,session
//! ctx sync                          # record checksums
//! ctx check --strict                # exit 1 if anything drifted
//! ctx load src/auth.rs              # print the context for a file
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`checksum`] | Content hashing |
//! | [`frontmatter`] | Metadata block parsing and validation |
//! | [`target`] | Target matching and rank resolution |
//! | [`search`] | Keyword relevance lookup |
//! | [`models`] | Registry data types |
//! | [`registry`] | Registry files, root discovery, global index |
//! | [`scan`] | Document discovery |
//! | [`document`] | Document to registry entry |
//! | [`freshness`] | Read-only drift check |
//! | [`sync`] | Registry synchronization |
//! | [`workspace`] | Explicit root/home/config |
//! | [`commands`] | CLI adapters |

pub mod checksum;
pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod freshness;
pub mod frontmatter;
pub mod models;
pub mod registry;
pub mod scan;
pub mod search;
pub mod sync;
pub mod target;
pub mod workspace;
