//! Terminal dashboard for an abattoir's stock, bons de commande and
//! history, backed by a client-side query cache.

pub mod api;
pub mod app;
pub mod commands;
pub mod config;
pub mod event;
pub mod logging;
pub mod query;
pub mod ui;
