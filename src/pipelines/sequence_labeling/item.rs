use std::fmt::Debug;

/// A trait for items that can be used for sequence labeling
pub trait Item: Send + Sync + Clone + Debug {
    /// Returns the words of the sentence
    fn words(&self) -> &[String];

    /// Returns one class label per word, or nothing for unlabelled input
    fn class_labels(&self) -> Vec<&str>;

    /// Returns the index of the corpus the sentence belongs to, which selects its CRF head
    fn file_no(&self) -> usize;
}
