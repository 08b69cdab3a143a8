//! Cross-cutting use cases that span several site modules.

mod ebook;

pub use ebook::{EbookDownloadUseCase, EbookError};
