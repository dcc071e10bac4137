// Résumé upload, listing, storage and text extraction.

pub mod extract;
pub mod handlers;
pub mod store;
