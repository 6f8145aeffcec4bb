pub mod inverted;
pub mod note_index;
pub mod posting;
