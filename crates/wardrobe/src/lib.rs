//! Wardrobe - visual clothing recommendations
//!
//! Embeds an uploaded photo with a pretrained image encoder and ranks a
//! precomputed gallery of clothing images by cosine similarity.

pub mod cli;
pub mod config;
pub mod error;
pub mod server;
