// SPDX-License-Identifier: GPL-3.0-only

//! Video output pipeline
//!
//! Picks the best installed H.264 encoder and muxes captured clips to MP4.

pub mod encoder_selection;
pub mod writer;

pub use encoder_selection::{EncoderInfo, available_encoders};
pub use writer::VideoWriter;
