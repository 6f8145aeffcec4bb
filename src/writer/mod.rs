pub mod envelope;
pub mod ingest;
pub mod note_writer;
