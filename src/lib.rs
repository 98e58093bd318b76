//! Job-application tracking core: a validated record model, a live view
//! kept in sync with a backing collection via push snapshots, a pure
//! derived-view computation for the dashboard, and a mutation gateway for
//! create/update/delete with attachment uploads.

pub mod gateway;
pub mod local;
pub mod models;
pub mod store;
pub mod sync;
pub mod tui;
pub mod view;
