/// Sequence Labeling
pub mod sequence_labeling;
