//! teamsim-server: HTTP front end for the simulated software team.
//!
//! A user message goes to one agent through `POST /interact`; the
//! orchestrator pulls in every collaborator that agent asks for and the
//! composite reply comes back as one response. Projects and their exchange
//! log live in SQLite.

pub mod config;
pub mod db;
pub mod server;
pub mod web;
