pub mod comment;
pub mod post;
pub mod session;

pub use comment::{CommentRecord, Reaction, ShareStatus};
pub use post::{PostIdentity, PostKind, PostSnapshot};
pub use session::{ScrapeSession, VerificationFailure, VerificationReport};
