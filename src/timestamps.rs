/**
 * Restores file timestamps from the photo's capture date
 *
 * The capture date is exiftool's `Create Date` tag, in local wall-clock time.
 * It becomes the file's modification time (and creation time where the
 * platform allows setting it); the access time is set to now.
 */

use chrono::{Local, NaiveDateTime, TimeZone};
use filetime::FileTime;
use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{OrganizeError, Result};
use crate::exiftool::ExifTool;

pub const CAPTURE_DATE_TAG: &str = "Create Date";

const CAPTURE_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampOutcome {
    Corrected { path: PathBuf, captured: NaiveDateTime },
    NoMetadata { path: PathBuf },
    NoCaptureDate { path: PathBuf },
    Failed { path: PathBuf, message: String },
}

impl TimestampOutcome {
    pub fn is_corrected(&self) -> bool {
        matches!(self, Self::Corrected { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Parse `year:month:day hour:minute:second[.fraction]`.
///
/// A trailing UTC offset (`+09:00`, `Z`) is ignored; the wall-clock value is kept.
pub fn parse_capture_date(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    let (naive_dt, remainder) = NaiveDateTime::parse_and_remainder(value, CAPTURE_DATE_FORMAT)
        .map_err(|_| OrganizeError::InvalidCaptureDate(value.to_string()))?;

    let remainder = remainder.trim();
    if !remainder.is_empty() && !remainder.starts_with(['+', '-', 'Z']) {
        return Err(OrganizeError::InvalidCaptureDate(value.to_string()));
    }

    Ok(naive_dt)
}

/// Interpret a capture date in the local time zone.
pub fn local_system_time(captured: NaiveDateTime) -> Result<SystemTime> {
    Local
        .from_local_datetime(&captured)
        .earliest()
        .map(SystemTime::from)
        .ok_or_else(|| OrganizeError::InvalidCaptureDate(captured.to_string()))
}

/// Read `path`'s metadata with `tool` and apply its capture date, if any.
pub fn correct_file_times(tool: &ExifTool, path: &Path) -> TimestampOutcome {
    let tags = tool.extract(path);
    if !tags.has_data() {
        debug!("No metadata for {}", path.display());
        return TimestampOutcome::NoMetadata {
            path: path.to_path_buf(),
        };
    }

    let Some(record) = tags.find(&tool.tag_name(CAPTURE_DATE_TAG)) else {
        debug!("No {} tag in {}", CAPTURE_DATE_TAG, path.display());
        return TimestampOutcome::NoCaptureDate {
            path: path.to_path_buf(),
        };
    };

    let applied = parse_capture_date(&record.value).and_then(|captured| {
        let capture_time = local_system_time(captured)?;
        apply_capture_time(path, capture_time)?;
        Ok(captured)
    });

    match applied {
        Ok(captured) => {
            info!("Set {} to {}", path.display(), captured);
            TimestampOutcome::Corrected {
                path: path.to_path_buf(),
                captured,
            }
        }
        Err(e) => {
            warn!("Skipping timestamps of {}: {}", path.display(), e);
            TimestampOutcome::Failed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        }
    }
}

/// Set modification and creation time to `capture_time`, access time to now.
pub fn apply_capture_time(path: &Path, capture_time: SystemTime) -> io::Result<()> {
    set_times(
        path,
        FileTime::now(),
        FileTime::from_system_time(capture_time),
        capture_time,
    )
}

// All three times go through one handle; a file that cannot be opened for
// writing is left untouched.
#[cfg(any(windows, target_os = "macos"))]
fn set_times(
    path: &Path,
    accessed: FileTime,
    modified: FileTime,
    created: SystemTime,
) -> io::Result<()> {
    let file = std::fs::OpenOptions::new().write(true).open(path)?;
    filetime::set_file_handle_times(&file, Some(accessed), Some(modified))?;
    set_creation_time(&file, created)
}

#[cfg(not(any(windows, target_os = "macos")))]
fn set_times(
    path: &Path,
    accessed: FileTime,
    modified: FileTime,
    _created: SystemTime,
) -> io::Result<()> {
    // Birth time cannot be set on this platform
    filetime::set_file_times(path, accessed, modified)
}

#[cfg(windows)]
fn set_creation_time(file: &std::fs::File, created: SystemTime) -> io::Result<()> {
    use std::os::windows::fs::FileTimesExt;

    file.set_times(std::fs::FileTimes::new().set_created(created))
}

#[cfg(target_os = "macos")]
fn set_creation_time(file: &std::fs::File, created: SystemTime) -> io::Result<()> {
    use std::os::macos::fs::FileTimesExt;

    file.set_times(std::fs::FileTimes::new().set_created(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_milli_opt(h, mi, s, ms)
            .unwrap()
    }

    #[test]
    fn test_parse_with_fraction() {
        assert_eq!(
            parse_capture_date("2021:03:09 10:15:00.250").unwrap(),
            at(2021, 3, 9, 10, 15, 0, 250)
        );
    }

    #[test]
    fn test_parse_without_fraction_and_with_offset() {
        assert_eq!(
            parse_capture_date("2021:03:09 10:15:00").unwrap(),
            at(2021, 3, 9, 10, 15, 0, 0)
        );
        assert_eq!(
            parse_capture_date(" 2021:03:09 10:15:00.5+09:00 ").unwrap(),
            at(2021, 3, 9, 10, 15, 0, 500)
        );
    }

    #[test]
    fn test_parse_rejects_malformed_values() {
        for value in [
            "",
            "0000:00:00 00:00:00",
            "2021-03-09 10:15:00",
            "2021:03:09",
            "2021:03:09 10:15:00 junk",
        ] {
            assert!(
                matches!(parse_capture_date(value), Err(OrganizeError::InvalidCaptureDate(_))),
                "{value}"
            );
        }
    }

    #[test]
    fn test_missing_tool_is_no_metadata() {
        let dir = tempfile::TempDir::new().unwrap();
        let photo = dir.path().join("a.jpg");
        fs::write(&photo, b"jpeg").unwrap();

        let tool = ExifTool::new(dir.path().join("no-exiftool"));
        assert_eq!(
            correct_file_times(&tool, &photo),
            TimestampOutcome::NoMetadata { path: photo.clone() }
        );
    }

    #[test]
    fn test_apply_capture_time_sets_modification_time() {
        let dir = tempfile::TempDir::new().unwrap();
        let photo = dir.path().join("a.jpg");
        fs::write(&photo, b"jpeg").unwrap();

        let captured = local_system_time(at(2019, 12, 24, 18, 30, 0, 0)).unwrap();
        apply_capture_time(&photo, captured).unwrap();

        let modified = FileTime::from_last_modification_time(&fs::metadata(&photo).unwrap());
        assert_eq!(modified, FileTime::from_system_time(captured));
    }

    #[cfg(any(windows, target_os = "macos"))]
    #[test]
    fn test_read_only_file_is_left_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let photo = dir.path().join("a.jpg");
        fs::write(&photo, b"jpeg").unwrap();
        let original = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_times(&photo, original, original).unwrap();

        let mut permissions = fs::metadata(&photo).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&photo, permissions).unwrap();

        let captured = local_system_time(at(2019, 12, 24, 18, 30, 0, 0)).unwrap();
        assert!(apply_capture_time(&photo, captured).is_err());

        let modified = FileTime::from_last_modification_time(&fs::metadata(&photo).unwrap());
        assert_eq!(modified, original);

        let mut permissions = fs::metadata(&photo).unwrap().permissions();
        permissions.set_readonly(false);
        fs::set_permissions(&photo, permissions).unwrap();
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::*;
        use tempfile::TempDir;

        fn fake_tool(dir: &TempDir, output: &str) -> ExifTool {
            let script = dir.path().join("exiftool");
            fs::write(&script, format!("printf '{}'\n", output)).unwrap();
            ExifTool::with_interpreter("sh", script)
        }

        fn photo_with_mtime(dir: &TempDir, unix_seconds: i64) -> PathBuf {
            let photo = dir.path().join("photo.jpg");
            fs::write(&photo, b"jpeg").unwrap();
            let mtime = FileTime::from_unix_time(unix_seconds, 0);
            filetime::set_file_times(&photo, mtime, mtime).unwrap();
            photo
        }

        fn mtime_of(path: &Path) -> FileTime {
            FileTime::from_last_modification_time(&fs::metadata(path).unwrap())
        }

        #[test]
        fn test_applies_create_date() {
            let dir = TempDir::new().unwrap();
            let tool = fake_tool(&dir, "EXIF\\tMake\\tCanon\\nEXIF\\tCreate Date\\t2021:03:09 10:15:00.000\\n");
            let photo = photo_with_mtime(&dir, 1_700_000_000);

            let outcome = correct_file_times(&tool, &photo);
            assert!(outcome.is_corrected());

            let expected = local_system_time(at(2021, 3, 9, 10, 15, 0, 0)).unwrap();
            assert_eq!(mtime_of(&photo), FileTime::from_system_time(expected));

            let accessed = FileTime::from_last_access_time(&fs::metadata(&photo).unwrap());
            assert!(accessed.unix_seconds() > 1_700_000_000);
        }

        #[test]
        fn test_short_tag_names() {
            let dir = TempDir::new().unwrap();
            let tool = fake_tool(&dir, "EXIF\\tCreateDate\\t2021:03:09 10:15:00\\n").short_tag_names(true);
            let photo = photo_with_mtime(&dir, 1_700_000_000);

            assert!(correct_file_times(&tool, &photo).is_corrected());
        }

        #[test]
        fn test_missing_tag_leaves_times_untouched() {
            let dir = TempDir::new().unwrap();
            let tool = fake_tool(&dir, "EXIF\\tMake\\tCanon\\n");
            let photo = photo_with_mtime(&dir, 1_600_000_000);

            let outcome = correct_file_times(&tool, &photo);
            assert_eq!(outcome, TimestampOutcome::NoCaptureDate { path: photo.clone() });
            assert_eq!(mtime_of(&photo).unix_seconds(), 1_600_000_000);
        }

        #[test]
        fn test_unparsable_date_is_skipped() {
            let dir = TempDir::new().unwrap();
            let tool = fake_tool(&dir, "EXIF\\tCreate Date\\t0000:00:00 00:00:00\\n");
            let photo = photo_with_mtime(&dir, 1_600_000_000);

            assert!(correct_file_times(&tool, &photo).is_failure());
            assert_eq!(mtime_of(&photo).unix_seconds(), 1_600_000_000);
        }
    }
}
