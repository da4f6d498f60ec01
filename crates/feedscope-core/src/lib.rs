// Library root: the scope switcher engine, its collaborator traits, and the
// concrete adapters used by the terminal front-end.

pub mod bridge;
pub mod collab;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod online;
pub mod poller;
pub mod protocol;
pub mod reconciler;
pub mod runtime;
pub mod scope;
pub mod store;
pub mod switcher;
pub mod team;
