#![forbid(unsafe_code)]

mod frame;
mod pager;
mod store;

pub use pager::{Pager, PagerOptions, PagerStats};
pub use store::{
    CheckpointListener, PageHandle, PageReadGuard, PageStore, PageUpgradableGuard, PageWriteGuard,
};
