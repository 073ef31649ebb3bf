// Re-export main components
pub mod attachment;
pub mod error;
pub mod format;
pub mod hash;
pub mod io_ext;
pub mod model;
pub mod reader_abc;
pub mod reader_ltb_pc;
pub mod reader_ltb_ps2;
pub mod types;
pub mod vif;
pub mod writer_abc;
pub mod writer_lta;

// Re-export common types
pub use error::{ModelError, Result};
pub use format::{read_model, read_model_file, FileKind};
pub use model::Model;
pub use reader_abc::AbcReader;
pub use reader_ltb_pc::PcLtbReader;
pub use reader_ltb_ps2::Ps2LtbReader;
pub use writer_abc::AbcWriter;
pub use writer_lta::LtaWriter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
