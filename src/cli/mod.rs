/// CLI Indexes: Word encoders
pub mod encoder;

/// CLI Indexes: CRF variants
pub mod crf;

pub use crf::Crf;
pub use encoder::Encoder;

/// Split a comma separated list of paths, dropping empty entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
