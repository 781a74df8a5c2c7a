//! HTTP surface. Public guest pages live at `/`, the couple's dashboard at `/admin`.

pub mod admin;
pub mod public;
