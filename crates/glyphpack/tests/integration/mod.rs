//! Integration tests for the encode/decode pipeline.
//!
//! These tests drive the public API end to end, from weight collections to
//! payload text and back.

mod end_to_end;
mod scenarios;
