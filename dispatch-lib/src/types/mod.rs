#![allow(unreachable_pub)]

mod error;
mod work_item;

pub use error::ErrorKind;
pub use work_item::{Callback, callback};
pub(crate) use work_item::WorkItem;

/// The dispatch `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
