pub mod author;
pub mod finding;
pub mod page;
pub mod task;

pub use author::{Author, Assignment, EMAIL_NOT_FOUND};
pub use finding::{Finding, ImageMap, ImageRef, StalenessRecord};
pub use page::{Page, PageListing, Revision};
pub use task::TaskFlag;
