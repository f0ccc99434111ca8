//! HTTP provider adapters for the Alexandria enrichment core.
//!
//! Each adapter implements the `alexandria-core` capability traits over one
//! upstream API and normalizes its failures into `AlexandriaError`:
//!
//! - [`IsbndbProvider`]: the metered commercial source; single and batch
//!   metadata plus paged author bibliographies.
//! - [`OpenLibraryProvider`]: free metadata, work-based edition variants,
//!   and cover URLs.
//! - [`GoogleBooksProvider`]: free metadata with volume-id crosswalk
//!   references and cover URLs.
//! - [`WikidataProvider`]: author identity resolution.
//! - [`ListGenProvider`]: schema-constrained AI candidate-list generation.
//!
//! Every adapter accepts a base-URL override so tests can point it at a
//! local mock server.
#![warn(missing_docs)]

mod http;

/// Google Books volume adapter.
pub mod googlebooks;
/// ISBNdb commercial adapter.
pub mod isbndb;
/// Schema-constrained AI list generation adapter.
pub mod listgen;
/// Open Library adapter.
pub mod openlibrary;
/// Wikidata identity adapter.
pub mod wikidata;

pub use googlebooks::GoogleBooksProvider;
pub use isbndb::IsbndbProvider;
pub use listgen::ListGenProvider;
pub use openlibrary::OpenLibraryProvider;
pub use wikidata::WikidataProvider;
