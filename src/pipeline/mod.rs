//! Pipeline entry points for crawler operations.
//!
//! - `run_crawler`: Paginate every start URL into the dataset
//! - `run_validate`: Check configuration and input without crawling

pub mod crawl;
pub mod validate;

pub use crawl::run_crawler;
pub use validate::run_validate;
