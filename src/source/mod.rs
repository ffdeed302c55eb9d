//! 游标分页读取模块：基于 (timestamp, id) 键集的可恢复增量读取。
//!
//! # Cursor Pager Module
//!
//! Resumable, duplicate-free reads over an ordered external source. Offset
//! paging skips or repeats rows when new rows arrive mid-run; keyset paging on
//! `(timestamp, id)` does not.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CursorPager`] | Page reader owning the cursor and its checkpoint |
//! | [`Cursor`] / [`Checkpoint`] | In-memory position and its persisted form |
//! | [`ItemSource`] | Upstream store contract |
//! | [`CheckpointStore`] | Blob storage for checkpoints |
//! | [`MemoryItemSource`] / [`MemoryCheckpointStore`] | In-memory implementations |

mod cursor;
mod memory;
mod pager;
mod traits;

pub use cursor::{Checkpoint, Cursor};
pub use memory::{MemoryCheckpointStore, MemoryItemSource};
pub use pager::{CursorPager, ReaderConfig};
pub use traits::{CheckpointStore, ItemSource};
