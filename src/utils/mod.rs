/// File utilities
pub mod files;

/// Tensor Utilities
pub mod tensors;

/// Renderer Utilities
pub mod renderer;

/// Utilities for label and token maps
pub mod classes;

/// Pre-trained word vectors
pub mod embeddings;
