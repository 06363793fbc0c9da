//! Unit test module
//!
//! Middleware unit tests live here, separate from source files.
