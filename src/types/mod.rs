//! 类型系统模块：定义批处理流水线中流转的核心数据类型。
//!
//! # Types Module
//!
//! Core values that flow through the pipeline: the content [`Item`] read from
//! the upstream store, the [`FailureAnnotation`] that carries retry context
//! back to it, and the [`Summary`] returned by the summarization service.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Item`] | A content item (post/article) to be summarized |
//! | [`FailureAnnotation`] | Diagnostic fields stamped on a failed item |
//! | [`Summary`] | Summarization output for one item |
//! | [`SummarizedItem`] | An item paired with its summary |

mod item;

pub use item::{FailureAnnotation, Item, SummarizedItem, Summary};
