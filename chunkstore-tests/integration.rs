//! Integration tests for fs-chunk-store
//!
//! The abstract chunk store suite runs against every store flavour: a fixed
//! single backing file, a generated temporary path and a multi-file layout.
//! Further modules cover multi-file spanning, lifecycle and tail chunks on
//! the real filesystem.

#[path = "integration/abstract_store.rs"]
mod abstract_store;
#[path = "integration/lifecycle.rs"]
mod lifecycle;
#[path = "integration/multi_file.rs"]
mod multi_file;
#[path = "integration/support.rs"]
mod support;
#[path = "integration/tail_chunks.rs"]
mod tail_chunks;
