//! CLI integration tests over fixture packages.

mod common;
mod check_tests;
mod order_tests;
mod plan_tests;
