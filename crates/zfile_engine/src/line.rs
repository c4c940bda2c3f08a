/* 📖 # What does line reading normalize?

Data files are edited on every platform, so a line may end in `\n` or `\r\n`. A lone
`\r` also ends the line; the byte after it is pushed back with a one-byte relative
seek so the next call starts there. Tabs become spaces up to the next tab stop so
column-based parsers see the same layout everywhere.

The capacity contract matches a fixed-size C buffer: at most `capacity - 1` bytes are
stored, and a tab whose stop would not fit pads to the limit and ends the line.
*/

use std::fmt;

use zfile_base::{ZFileError, ZFileResult};

use crate::file::FileHandle;

impl FileHandle {
    /// Reads the next line into `buffer` (cleared first), without its terminator.
    ///
    /// Returns `false` only if the file ended before any byte was stored.
    pub fn read_line(&mut self, buffer: &mut Vec<u8>, capacity: usize) -> ZFileResult<bool> {
        if capacity == 0 {
            return Err(Box::new(ZFileError::invalid_argument(
                "line capacity must be at least 1",
            )));
        }
        buffer.clear();
        let max_len = capacity - 1;
        let tab_columns = self.config.tab_columns;
        let mut seen_cr = false;

        while buffer.len() < max_len {
            let Some(byte) = self.read_byte() else {
                return Ok(!buffer.is_empty());
            };
            match byte {
                b'\r' => seen_cr = true,
                b'\n' => return Ok(true),
                _ if seen_cr => {
                    self.skip(-1)?;
                    return Ok(true);
                }
                b'\t' => {
                    let stop = (buffer.len() + tab_columns) / tab_columns * tab_columns;
                    if stop >= capacity {
                        buffer.resize(max_len, b' ');
                        return Ok(true);
                    }
                    buffer.resize(stop, b' ');
                }
                _ => buffer.push(byte),
            }
        }
        Ok(true)
    }

    /// Like [`FileHandle::read_line`], decoding the line lossily; `None` at end of file.
    pub fn read_line_lossy(&mut self, capacity: usize) -> ZFileResult<Option<String>> {
        let mut buffer = Vec::with_capacity(capacity);
        if !self.read_line(&mut buffer, capacity)? {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
    }

    /// Writes `text` as is.
    pub fn write_line(&mut self, text: &str) -> ZFileResult<()> {
        self.write(text.as_bytes())
    }

    /// Renders `args` and writes the result.
    ///
    /// Nothing is written if the render is empty or does not fit the format bound.
    pub fn write_formatted(&mut self, args: fmt::Arguments<'_>) -> ZFileResult<()> {
        let rendered = fmt::format(args);
        if rendered.is_empty() {
            zfile_base::bail!("formatted output to '{}' was empty", self.path());
        }
        let limit = self.config.max_format_len;
        if rendered.len() >= limit {
            return Err(Box::new(ZFileError::invalid_argument(format!(
                "formatted output of {} bytes exceeds the limit of {}",
                rendered.len(),
                limit - 1
            ))));
        }
        self.write_line(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use zfile_base::{FilePath, MockPal, PalHandle};

    use crate::{FileHandle, FileMode, FileSystem, FileType};

    fn reader(content: &[u8]) -> FileHandle {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("/lines.txt"), content.to_vec());
        FileSystem::new(PalHandle::new(mock))
            .open(&FilePath::from("/lines.txt"), FileMode::Read, FileType::Text)
            .unwrap()
    }

    fn all_lines(content: &[u8], capacity: usize) -> Vec<String> {
        let mut file = reader(content);
        let mut lines = Vec::new();
        while let Some(line) = file.read_line_lossy(capacity).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_tab_and_crlf() {
        let mut file = reader(b"a\tb\r\n");
        let mut buffer = Vec::new();

        assert!(file.read_line(&mut buffer, 80).unwrap());
        assert_eq!(buffer, b"a   b");
        assert!(!file.read_line(&mut buffer, 80).unwrap());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_line_endings() {
        assert_eq!(
            all_lines(b"one\ntwo\r\nthree\rfour", 80),
            vec!["one", "two", "three", "four"]
        );
    }

    #[test]
    fn test_lone_cr_pushes_back_next_byte() {
        let mut file = reader(b"ab\rcd");
        let mut buffer = Vec::new();
        assert!(file.read_line(&mut buffer, 80).unwrap());
        assert_eq!(buffer, b"ab");
        assert_eq!(file.tell().unwrap(), 3);
        assert!(file.read_line(&mut buffer, 80).unwrap());
        assert_eq!(buffer, b"cd");
    }

    #[test]
    fn test_trailing_cr_at_end_of_file() {
        assert_eq!(all_lines(b"x\r", 80), vec!["x"]);
        assert!(all_lines(b"\r", 80).is_empty());
    }

    #[test]
    fn test_empty_lines_are_reported() {
        assert_eq!(all_lines(b"\n\nz", 80), vec!["", "", "z"]);
    }

    #[test]
    fn test_capacity_splits_long_lines() {
        assert_eq!(all_lines(b"abcdefg\n", 4), vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_tab_stops() {
        assert_eq!(all_lines(b"\tx\n", 80), vec!["    x"]);
        assert_eq!(all_lines(b"abcd\tx\n", 80), vec!["abcd    x"]);
        assert_eq!(all_lines(b"abc\tx\n", 80), vec!["abc x"]);
    }

    #[test]
    fn test_tab_past_capacity_pads_and_ends_line() {
        let mut file = reader(b"ab\tcd\n");
        let mut buffer = Vec::new();
        assert!(file.read_line(&mut buffer, 4).unwrap());
        assert_eq!(buffer, b"ab ");
        assert!(file.read_line(&mut buffer, 4).unwrap());
        assert_eq!(buffer, b"cd");
    }

    #[test]
    fn test_zero_capacity_is_invalid() {
        let mut file = reader(b"x");
        let mut buffer = Vec::new();
        assert!(
            file.read_line(&mut buffer, 0)
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn test_capacity_one_stores_nothing() {
        let mut file = reader(b"x\n");
        let mut buffer = Vec::new();
        assert!(file.read_line(&mut buffer, 1).unwrap());
        assert!(buffer.is_empty());
        assert_eq!(file.tell().unwrap(), 0);
    }

    #[test]
    fn test_lossy_decoding() {
        assert_eq!(all_lines(b"caf\xe9\n", 80), vec!["caf\u{fffd}"]);
    }

    fn writer() -> (MockPal, FileHandle) {
        let mock = MockPal::new();
        let file = FileSystem::new(PalHandle::new(mock.clone()))
            .open(&FilePath::from("/out.txt"), FileMode::Write, FileType::Text)
            .unwrap();
        (mock, file)
    }

    #[test]
    fn test_write_line_and_formatted() {
        let (mock, mut file) = writer();
        file.write_line("header\n").unwrap();
        file.write_formatted(format_args!("{}={}\n", "depth", 12))
            .unwrap();
        file.close().unwrap();

        assert_eq!(
            mock.file_content(&FilePath::from("/out.txt")).unwrap(),
            b"header\ndepth=12\n"
        );
    }

    #[test]
    fn test_write_formatted_rejects_empty_render() {
        let (mock, mut file) = writer();
        let err = file.write_formatted(format_args!("{}", "")).unwrap_err();
        assert_eq!(err.to_string(), "formatted output to '/out.txt' was empty");
        file.close().unwrap();
        assert!(
            mock.file_content(&FilePath::from("/out.txt"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_write_formatted_bound() {
        let (mock, mut file) = writer();
        let fits = "x".repeat(1023);
        file.write_formatted(format_args!("{}", fits)).unwrap();

        let too_long = "x".repeat(1024);
        let err = file
            .write_formatted(format_args!("{}", too_long))
            .unwrap_err();
        assert!(err.is_invalid_argument());
        file.close().unwrap();

        assert_eq!(
            mock.file_content(&FilePath::from("/out.txt")).unwrap().len(),
            1023
        );
    }
}
