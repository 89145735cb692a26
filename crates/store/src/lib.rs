//! Persistence backends for the last observed position snapshot.

pub mod appwrite;
pub mod document_store;
pub mod error;
pub mod file_store;

pub use appwrite::{AppwriteClient, AppwriteConfig, Query};
pub use document_store::DocumentStateStore;
pub use error::AppwriteError;
pub use file_store::{FileStateStore, PersistenceError};
