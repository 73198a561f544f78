pub mod batch;
pub mod error;
pub mod exiftool;
pub mod file_ops;
pub mod folder_name;
pub mod hashing;
pub mod logging;
pub mod process;
pub mod tag_output;
pub mod timestamps;

pub use batch::{correct_timestamps_only, normalize_folders, BatchOptions, BatchReport};
pub use error::OrganizeError;
pub use exiftool::ExifTool;
pub use file_ops::{CollisionPolicy, DirectoryOutcome, DirectoryTask};
pub use folder_name::{resolve_folder_name, ResolvedDate};
pub use tag_output::{parse_tag_output, TagRecord, TagSet};
