// Pagination module - Boundary types for the paginated entity list collaborator
mod cache;
mod page;

pub use cache::PageCache;
pub use page::{Page, PageMeta, PageQuery};
