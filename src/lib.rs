pub mod footer;
pub mod codec;
pub mod container;
pub mod traverse;

pub use footer::{Footer, FOOTER_SIZE, MAGIC};
pub use codec::{CodecError, CompressionType, get_codec};
pub use container::{compress, decompress, verify, inspect};
pub use traverse::{
    process, verify_tree, FileEvent, IgnoreReason, Mode, Tally, TraversalError,
    TraversalOptions, Walker, CONTAINER_EXTENSION,
};
