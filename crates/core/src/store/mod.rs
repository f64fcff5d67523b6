pub use document_store::{CatalogStores, DocumentStore, Named};

mod document_store;
