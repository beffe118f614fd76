pub mod client;
pub mod error;
pub mod traits;

pub use client::MetadataClient;
pub use error::MetadataError;
pub use traits::{LookupRequest, MetadataService};
