//! Tests for the binary's argument handling and process-level policy.
