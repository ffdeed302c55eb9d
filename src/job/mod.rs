//! 摘要作业：按页读取、打包、派发、回写并推进检查点。
//!
//! # Summary Job
//!
//! Wires the components into the single coordinating sequence of a run:
//!
//! ```text
//! CursorPager ─▶ DynamicBatchBuilder ─▶ BatchOrchestrator ─▶ ItemWriter
//!      ▲                                        │
//!      └──── update() after each page ◀── RetryQueue
//! ```
//!
//! Only the orchestrator runs concurrently. The checkpoint outlives the run,
//! so the next run continues after the last item read. Failed items are
//! written back with their failure context and scheduled in the retry queue.

mod runner;
mod writer;

pub use runner::{JobReport, SummaryJob, SummaryJobBuilder};
pub use writer::{ItemWriter, MemoryItemWriter};
