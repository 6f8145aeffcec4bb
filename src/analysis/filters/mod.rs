pub mod entity;
pub mod stemmer;
pub mod stopword;
