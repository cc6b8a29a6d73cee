//! Taskboard - a terminal client for a remote kanban task API.
//!
//! The library holds the session, the HTTP client, the task store and the
//! board/editor state that both the one-shot commands and the TUI drive.

pub mod api;
pub mod assignee;
pub mod auth;
pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod models;
pub mod session;
pub mod store;
pub mod tui;

#[cfg(test)]
pub(crate) mod testing;
