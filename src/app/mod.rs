pub mod cancel;
pub mod context;
pub mod error;

pub use cancel::CancelFlag;
pub use context::AppContext;
pub use error::{Result, ScrapeError};
