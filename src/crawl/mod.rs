//! Crawl progress bookkeeping: checkpoint file, resume rules, CSV backups and
//! the network retry policy.

pub mod backup;
pub mod checkpoint;
pub mod resume;
pub mod retry;

pub use backup::{JobBackup, LinkBackup};
pub use checkpoint::{CheckpointStore, CrawlStage, CrawlState};
pub use resume::{QueryStart, Resume, ResumePlan};
pub use retry::{Retry, RetryPolicy};
