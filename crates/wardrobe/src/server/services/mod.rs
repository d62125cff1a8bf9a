//! Embedding, gallery, and ranking services shared by the server and CLI

pub mod encoder;
pub mod gallery;
pub mod similarity;
