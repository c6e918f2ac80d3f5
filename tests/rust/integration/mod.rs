//! Integration tests - client calls and typed hydration over joined rows
//!
//! The in-memory driver stands in for a store; every test checks results
//! through the public API only.

mod client_tests;
mod hydration_tests;
