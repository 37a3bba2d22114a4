//! A REST service that registers Git repository webhooks as triggers on a shared Tekton
//! `EventListener`.
//!
//! The Tekton dashboard talks to the [`api`]. Each webhook becomes a set of triggers on a single
//! event listener in the installed namespace, which the [`registrar`] creates with the first
//! webhook and removes with the last one. The physical webhook at the Git provider is managed
//! through the [`hub`].

pub mod api;
pub mod cli;
pub mod cluster;
pub mod constants;
pub mod credentials;
pub mod dashboard;
pub mod git;
pub mod hub;
pub mod logging;
pub mod network;
pub mod registrar;
pub mod signal;
pub mod token;
pub mod triggers;
pub mod webhook;
