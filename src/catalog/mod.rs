//! 采集记录 Catalog：按快照划分、多批次文件、只追加

pub mod entry;
pub mod layout;
pub mod reader;
pub mod writer;

pub use entry::{catalog_schema, CatalogEntry};
pub use layout::CatalogLayout;
pub use reader::{CatalogReader, Entries};
pub use writer::{CatalogWriter, WriteSummary};
