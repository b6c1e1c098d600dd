//! Live reload: file watching, regeneration and browser notification.

mod client;
mod debouncer;
mod manager;
mod websocket;

pub(crate) use client::{CLIENT_PATH, client_handler, client_script};
pub(crate) use manager::LiveReloadManager;
pub(crate) use websocket::{WS_PATH, ws_handler};
