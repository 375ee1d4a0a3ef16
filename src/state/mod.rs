//! State module for crawl tasks and requests
//!
//! # Components
//!
//! - `TaskStatus`: Lifecycle of one crawl task (running, then exactly one terminal state)
//! - `ContentKind`: Transport hint carried by every request (rendered page vs. plain resource)

mod content_kind;
mod task_status;

// Re-export main types
pub use content_kind::ContentKind;
pub use task_status::TaskStatus;
