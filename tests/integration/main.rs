//! Integration tests for ripple-frontier
//!
//! These tests use wiremock to stand up mock sites and run whole crawls
//! against them, with the reference store in a temporary work directory.

mod common;
mod crawl_tests;
mod frontier_tests;
mod orphan_tests;
mod policy_tests;
