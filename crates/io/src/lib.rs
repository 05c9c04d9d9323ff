// Input decoding for the reconciler: settlement grids and terminal log text

pub mod grid;
pub mod text;

pub use grid::{load_grid, GridFormat, LoadedGrid};
pub use text::{decode_text, decode_text_with, read_text_file, DecodedText};
