//! End-to-end assembly tests.
//!
//! Every component here builds in bootstrap mode against the host, so the
//! suite needs neither root nor a staged toolchain.

mod common;

mod caching_tests;
mod contents_tests;
mod failure_tests;
mod ordering_tests;
mod sources_tests;
