pub mod assembler;
pub mod csv_import;

pub use assembler::{ChunkOutcome, UploadError, UploadSessions};
pub use csv_import::{ImportError, ImportOutcome};
