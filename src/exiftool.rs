/**
 * Metadata reader backed by the external exiftool executable
 *
 * Every call spawns a fresh process and returns a fresh `TagSet`; an `ExifTool`
 * holds only its invocation settings and is shared by reference across workers.
 */

use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{OrganizeError, Result};
use crate::process;
use crate::tag_output::{parse_tag_output, TagSet};

#[cfg(windows)]
pub const EXIFTOOL_FILE_NAME: &str = "exiftool.exe";
#[cfg(not(windows))]
pub const EXIFTOOL_FILE_NAME: &str = "exiftool";

/// Shortest `-ver` response accepted as a real version string
const MIN_VERSION_RESPONSE_LEN: usize = 4;

/// Fast mode, grouped, tab-delimited, ignore minor errors, no warnings
const EXTRACT_ARGS: [&str; 6] = ["-fast", "-G", "-t", "-m", "-q", "-q"];
const WRITE_ARGS: [&str; 4] = ["-fast", "-m", "-q", "-q"];

#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    script: Option<PathBuf>,
    short_tag_names: bool,
}

impl ExifTool {
    /// Use the executable at `program`.
    ///
    /// `program` must name an existing file; bare command names are not looked
    /// up on `PATH` and are reported as unavailable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: None,
            short_tag_names: false,
        }
    }

    /// Use the executable shipped next to the running program.
    pub fn bundled() -> Self {
        let dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        Self::new(dir.join(EXIFTOOL_FILE_NAME))
    }

    /// Run the tool as `<interpreter> <script>`, e.g. `perl exiftool`.
    pub fn with_interpreter(interpreter: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            program: interpreter.into(),
            script: Some(script.into()),
            short_tag_names: false,
        }
    }

    /// Ask for tag names without whitespace (`-s`), e.g. `CreateDate`.
    pub fn short_tag_names(mut self, enabled: bool) -> Self {
        self.short_tag_names = enabled;
        self
    }

    /// The file that must exist for the tool to be usable.
    pub fn tool_path(&self) -> &Path {
        self.script.as_deref().unwrap_or(&self.program)
    }

    /// Tag name as it appears in this tool's output.
    pub fn tag_name(&self, long_name: &str) -> String {
        if self.short_tag_names {
            long_name.split_whitespace().collect()
        } else {
            long_name.to_string()
        }
    }

    /// Version string reported by `-ver`, if the tool is present and answers.
    pub fn version(&self) -> Option<String> {
        if !self.tool_path().is_file() {
            debug!("exiftool not found at {}", self.tool_path().display());
            return None;
        }

        let output = self.run(["-ver"]);
        let version = output.trim();
        if version.len() < MIN_VERSION_RESPONSE_LEN {
            debug!("Unexpected exiftool -ver response: {:?}", output);
            return None;
        }
        Some(version.to_string())
    }

    pub fn probe_available(&self) -> bool {
        self.version().is_some()
    }

    /// Like `probe_available`, but reports the missing tool as an error.
    pub fn ensure_available(&self) -> Result<String> {
        self.version()
            .ok_or_else(|| OrganizeError::ToolUnavailable(self.tool_path().to_path_buf()))
    }

    /// Read all tags of `file_path`. A tool that cannot run yields an empty set.
    pub fn extract(&self, file_path: &Path) -> TagSet {
        let mut args: Vec<OsString> = Vec::with_capacity(EXTRACT_ARGS.len() + 2);
        if self.short_tag_names {
            args.push("-s".into());
        }
        args.extend(EXTRACT_ARGS.iter().map(|arg| OsString::from(*arg)));
        args.push(file_path.as_os_str().to_os_string());

        let output = self.run(args);
        let tags = parse_tag_output(&output);
        debug!("Read {} tags from {}", tags.len(), file_path.display());
        tags
    }

    /// Copy the EXIF group of `source_image` into the sidecar file `destination_exif_file`.
    pub fn save_exif_data(&self, source_image: &Path, destination_exif_file: &Path) -> Result<()> {
        let mut args: Vec<OsString> = WRITE_ARGS.iter().map(|arg| OsString::from(*arg)).collect();
        args.push("-tagsfromfile".into());
        args.push(source_image.as_os_str().to_os_string());
        args.push("-exif".into());
        args.push(destination_exif_file.as_os_str().to_os_string());

        self.run_write(args)?;
        info!(
            "Saved EXIF data of {} to {}",
            source_image.display(),
            destination_exif_file.display()
        );
        Ok(())
    }

    /// Write every tag of `source_exif_file` onto the existing `destination_image`.
    pub fn write_exif_data(&self, source_exif_file: &Path, destination_image: &Path) -> Result<()> {
        let mut args: Vec<OsString> = WRITE_ARGS.iter().map(|arg| OsString::from(*arg)).collect();
        args.push("-TagsFromFile".into());
        args.push(source_exif_file.as_os_str().to_os_string());
        args.push("-all:all".into());
        args.push(destination_image.as_os_str().to_os_string());

        self.run_write(args)?;
        info!(
            "Wrote EXIF data from {} to {}",
            source_exif_file.display(),
            destination_image.display()
        );
        Ok(())
    }

    fn full_args<I, S>(&self, args: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.script
            .iter()
            .map(|script| script.as_os_str().to_os_string())
            .chain(args.into_iter().map(Into::into))
            .collect()
    }

    fn run<I, S>(&self, args: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        process::run_combined(&self.program, self.full_args(args))
    }

    fn run_write(&self, args: Vec<OsString>) -> Result<()> {
        if !self.tool_path().is_file() {
            return Err(OrganizeError::ToolUnavailable(self.tool_path().to_path_buf()));
        }

        let output = process::capture(&self.program, self.full_args(args))?;
        let combined = output.combined();
        if combined.contains("Error") {
            return Err(OrganizeError::ToolFailed(combined.trim().to_string()));
        }
        Ok(())
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::bundled()
    }
}
