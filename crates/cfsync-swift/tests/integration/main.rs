//! Integration tests for cfsync-swift
//!
//! Uses wiremock to simulate the identity service and a Swift container,
//! and verifies the request shapes and status classification of the
//! KeystoneIdentity and SwiftClient adapters.

mod common;

mod test_identity;
mod test_listing;
mod test_object_operations;
