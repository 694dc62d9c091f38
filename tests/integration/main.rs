//! Integration tests for Press-Sieve
//!
//! These tests drive whole batches against wiremock servers standing in for
//! news sites and the analysis API.

mod pipeline_tests;
