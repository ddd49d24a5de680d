//! GCN circular sources: the index page, individual circular pages, and the
//! raw `.gcn3` mirror.
//!
//! - [`IndexClient`] fetches the index; [`parse_circular_list`] turns it into
//!   [`BulletinReference`](gcnwatch_shared::BulletinReference)s
//! - [`TextRetriever`] produces the plain text of one circular

mod client;
mod listing;
mod text;

pub use client::{HttpFetcher, IndexClient};
pub use listing::parse_circular_list;
pub use text::{MIN_TEXT_LEN, TextRetriever, page_text};
