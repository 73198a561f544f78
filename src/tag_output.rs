/**
 * Parser for exiftool's tab-delimited grouped output (`-G -t`)
 *
 * Each line has the form `<group>\t<name>\t<value>`. Lines are terminated by
 * `\r`, `\r\n` or `\n`; lines with fewer than two tabs are ignored.
 */

/// Fragment exiftool appends to values whose binary payload it withheld.
pub const BINARY_NOTICE: &str = ", use -b option to extract";

/// One (group, name, value) triple reported by the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub group: String,
    pub name: String,
    pub value: String,
}

/// Immutable, ordered record set for a single file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    records: Vec<TagRecord>,
}

impl TagSet {
    pub fn new(records: Vec<TagRecord>) -> Self {
        Self { records }
    }

    /// First record in parse order whose name equals `tag_name`.
    pub fn find(&self, tag_name: &str) -> Option<&TagRecord> {
        self.records.iter().find(|record| record.name == tag_name)
    }

    pub fn has_data(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TagRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a TagRecord;
    type IntoIter = std::slice::Iter<'a, TagRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Parse the combined stdout/stderr text of one exiftool run.
///
/// Empty input is a valid "no metadata" result.
pub fn parse_tag_output(output: &str) -> TagSet {
    let records = output
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .filter_map(parse_line)
        .collect();

    TagSet::new(records)
}

fn parse_line(line: &str) -> Option<TagRecord> {
    let (group, rest) = line.split_once('\t')?;
    let (name, value) = rest.split_once('\t')?;

    // exiftool never emits an empty group; such lines are warnings or noise
    if group.is_empty() {
        return None;
    }

    Some(TagRecord {
        group: group.to_string(),
        name: name.to_string(),
        value: strip_binary_notice(value),
    })
}

fn strip_binary_notice(value: &str) -> String {
    match value.find(BINARY_NOTICE) {
        Some(pos) => {
            let mut stripped = String::with_capacity(value.len() - BINARY_NOTICE.len());
            stripped.push_str(&value[..pos]);
            stripped.push_str(&value[pos + BINARY_NOTICE.len()..]);
            stripped
        }
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_group_name_value() {
        let tags = parse_tag_output("EXIF\tCreate Date\t2021:03:09 10:15:00.000");
        assert_eq!(tags.len(), 1);
        let record = tags.find("Create Date").unwrap();
        assert_eq!(record.group, "EXIF");
        assert_eq!(record.name, "Create Date");
        assert_eq!(record.value, "2021:03:09 10:15:00.000");
    }

    #[test]
    fn test_accepts_all_line_terminators() {
        let output = "File\tFile Name\ta.jpg\r\nEXIF\tMake\tCanon\rEXIF\tModel\tEOS\nComposite\tMegapixels\t24.2\r\n";
        let tags = parse_tag_output(output);
        let names: Vec<&str> = tags.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["File Name", "Make", "Model", "Megapixels"]);
    }

    #[test]
    fn test_value_may_contain_tabs() {
        let tags = parse_tag_output("XMP\tDescription\tfirst\tsecond");
        assert_eq!(tags.find("Description").unwrap().value, "first\tsecond");
    }

    #[test]
    fn test_skips_lines_without_two_tabs() {
        let output = "Warning: odd file\r\nEXIF\tonly-one-tab\r\n\tName\tno group\r\nEXIF\tMake\tNikon\r\n";
        let tags = parse_tag_output(output);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.find("Make").unwrap().value, "Nikon");
    }

    #[test]
    fn test_strips_binary_notice_only() {
        let output = "EXIF\tThumbnail Image\t(Binary data 5120 bytes, use -b option to extract)";
        let tags = parse_tag_output(output);
        assert_eq!(
            tags.find("Thumbnail Image").unwrap().value,
            "(Binary data 5120 bytes)"
        );
    }

    #[test]
    fn test_empty_input_has_no_data() {
        let tags = parse_tag_output("");
        assert!(!tags.has_data());
        assert!(tags.find("Create Date").is_none());
    }

    #[test]
    fn test_find_returns_first_match() {
        let output = "EXIF\tCreate Date\t2021:03:09 10:15:00\r\nQuickTime\tCreate Date\t2022:01:01 00:00:00\r\n";
        let tags = parse_tag_output(output);
        assert_eq!(tags.find("Create Date").unwrap().group, "EXIF");
    }
}
