pub mod formats;
pub mod parser;
pub mod registry;
pub mod upload;

pub use formats::{DocxParser, PdfParser, TextParser};
pub use parser::{DocumentParser, IngestError};
pub use registry::{BoxedParser, ParserRegistry};
pub use upload::{file_extension, storage_path, UploadPolicy, UploadRejection};
