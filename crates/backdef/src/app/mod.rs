//! Application layer turning definition files into plans.

pub mod directives;
pub mod expand;
pub mod extglob;
pub mod implied;
pub mod naming;
pub mod pattern;
pub mod plan;
pub mod reader;
pub mod render;
