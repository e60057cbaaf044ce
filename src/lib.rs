//! mongo_admin: browser-facing administration gateway for a MongoDB deployment
//!
//! Translates panel requests into the server's own user/role management
//! commands (createUser, grantRolesToUser, createRole, ...). Credentials live
//! only in the session cookie; each request opens and closes its own connection.

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod models;
// Permission grants, action vocabularies and the permission-set builder
pub mod permissions;
// REST API module: Axum handlers for login/session and the admin commands
pub mod rest;
