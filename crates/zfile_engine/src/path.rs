/* 📖 # How are paths built?

`build_path(base, leaf)` mirrors how callers think about game-data locations: a base
directory (often starting with `~` on POSIX) plus a leaf that may itself be absolute.

1. Empty leaf: the base alone is processed
2. Absolute leaf (separator, or `~` on home-expanding backends) or empty base: the leaf
   alone is processed
3. Otherwise base and leaf are joined with a single separator

Processing a segment expands a leading `~` or `~user`. A user that cannot be resolved
(or whose name does not fit the 128-byte user-name buffer) drops the whole segment, so
`build_path("~nobody", "x")` yields `/x`. Callers that care must check the result.

The result is checked against the path bound instead of being truncated.

Directory listings join entry names with `join_path` instead: an entry called `~notes`
is a file name, not a home reference.
*/

use tracing::{debug, instrument, warn};

use zfile_base::{FilePath, PATH_SEP, PATH_SEP_CHAR, Pal, ZFileError, ZFileResult};

/// User names of this many bytes or more are not looked up.
pub const MAX_USER_NAME_LEN: usize = 128;

/// Joins `base` and `leaf` into a path of at most `max_len - 1` bytes.
#[instrument(skip(pal))]
pub fn build_path(
    pal: &dyn Pal,
    base: &str,
    leaf: &str,
    max_len: usize,
) -> ZFileResult<FilePath> {
    let mut path = String::new();

    if leaf.is_empty() {
        expand_segment(pal, &mut path, base);
    } else if base.is_empty() || is_rooted(pal, leaf) {
        expand_segment(pal, &mut path, leaf);
    } else {
        expand_segment(pal, &mut path, base);
        if !path.ends_with(PATH_SEP_CHAR) {
            path.push_str(PATH_SEP);
        }
        expand_segment(pal, &mut path, leaf);
    }

    check_path_len(&path, max_len)?;
    debug!(%path, "path built");
    Ok(FilePath::from(path))
}

/// Appends `name` to `dir` with a single separator, taking both literally.
pub fn join_path(dir: &str, name: &str, max_len: usize) -> ZFileResult<FilePath> {
    let mut path = String::with_capacity(dir.len() + name.len() + 1);
    path.push_str(dir);
    if !path.is_empty() && !path.ends_with(PATH_SEP_CHAR) {
        path.push_str(PATH_SEP);
    }
    path.push_str(name);
    check_path_len(&path, max_len)?;
    Ok(FilePath::from(path))
}

fn check_path_len(path: &str, max_len: usize) -> ZFileResult<()> {
    if path.len() >= max_len {
        return Err(Box::new(ZFileError::invalid_argument(format!(
            "path of {} bytes exceeds the limit of {}",
            path.len(),
            max_len.saturating_sub(1)
        ))));
    }
    Ok(())
}

fn is_rooted(pal: &dyn Pal, leaf: &str) -> bool {
    leaf.starts_with(PATH_SEP) || (pal.expands_home() && leaf.starts_with('~'))
}

fn expand_segment(pal: &dyn Pal, path: &mut String, segment: &str) {
    let rest = match segment.strip_prefix('~') {
        Some(rest) if pal.expands_home() => rest,
        _ => {
            path.push_str(segment);
            return;
        }
    };

    let (user, remainder) = match rest.find(PATH_SEP_CHAR) {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };
    if user.len() >= MAX_USER_NAME_LEN {
        warn!(length = user.len(), "user name too long, dropping path segment");
        return;
    }

    let home = pal.home_directory(if user.is_empty() { None } else { Some(user) });
    let Some(home) = home else {
        warn!(user, "no home directory found, dropping path segment");
        return;
    };

    if remainder.is_empty() {
        path.push_str(&home);
    } else {
        // remainder starts with the separator
        path.push_str(home.trim_end_matches(PATH_SEP_CHAR));
        path.push_str(remainder);
    }
}

/// Byte offset of the file name within `path`: one past the last separator, or 0.
pub fn filename_index(path: &str) -> usize {
    let mut index = 0;
    for (position, byte) in path.bytes().enumerate() {
        if byte == PATH_SEP_CHAR as u8 {
            index = position + 1;
        }
    }
    index
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use zfile_base::MockPal;

    const MAX: usize = 1024;

    fn mock_with_homes() -> MockPal {
        let mock = MockPal::new();
        mock.set_home_directory(None, "/home/me");
        mock.set_home_directory(Some("ann"), "/home/ann/");
        mock.set_home_directory(Some("root"), "/");
        mock
    }

    fn build(base: &str, leaf: &str) -> String {
        build_path(&mock_with_homes(), base, leaf, MAX)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_join_inserts_single_separator() {
        assert_eq!(build("/a/b", "c"), "/a/b/c");
        assert_eq!(build("/a/b/", "c"), "/a/b/c");
    }

    #[test]
    fn test_absolute_leaf_wins() {
        assert_eq!(build("/anything", "/abs"), "/abs");
        assert_eq!(build("", "rel"), "rel");
    }

    #[test]
    fn test_empty_leaf_uses_base() {
        assert_eq!(build("/a/b", ""), "/a/b");
        assert_eq!(build("", ""), "");
        assert_eq!(build("~", ""), "/home/me");
    }

    #[test]
    fn test_home_expansion() {
        assert_eq!(build("/ignored", "~"), "/home/me");
        assert_eq!(build("~", "lib"), "/home/me/lib");
        assert_eq!(build("~/", "lib"), "/home/me/lib");
        assert_eq!(build("~/games", "save"), "/home/me/games/save");
        assert_eq!(build("~ann/x", "y"), "/home/ann/x/y");
        assert_eq!(build("~root/etc", ""), "/etc");
    }

    #[test]
    fn test_home_with_trailing_separator_joins_once() {
        assert_eq!(build("~root", "etc"), "/etc");
        assert_eq!(build("~ann", "y"), "/home/ann/y");
        assert_eq!(build("~root/", "etc"), "/etc");
    }

    #[test]
    fn test_tilde_only_expands_at_start() {
        assert_eq!(build("/a", "b~c"), "/a/b~c");
        assert_eq!(build("/a~", "c"), "/a~/c");
    }

    #[test]
    fn test_unknown_user_drops_segment() {
        assert_eq!(build("~nobody", "x"), "/x");
        assert_eq!(build("~nobody/games", ""), "");
    }

    #[test]
    fn test_long_user_name_drops_segment() {
        let long_user = format!("~{}/x", "u".repeat(MAX_USER_NAME_LEN));
        assert_eq!(build(&long_user, ""), "");
    }

    #[test]
    fn test_tilde_is_literal_without_home_expansion() {
        let mock = mock_with_homes().with_home_expansion(false);
        let path = build_path(&mock, "/base", "~/x", MAX).unwrap();
        assert_eq!(path.as_str(), "/base/~/x");
    }

    #[test]
    fn test_path_bound() {
        let mock = MockPal::new();
        let fits = "a".repeat(1022);
        assert_eq!(build_path(&mock, "/", &fits, MAX).unwrap().len(), 1023);

        let too_long = "a".repeat(1023);
        let err = build_path(&mock, "/", &too_long, MAX).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_join_path_keeps_names_literal() {
        assert_eq!(join_path("/d", "~notes", MAX).unwrap().as_str(), "/d/~notes");
        assert_eq!(join_path("/d/", "~root", MAX).unwrap().as_str(), "/d/~root");
        assert_eq!(join_path("", "f", MAX).unwrap().as_str(), "f");
        assert!(join_path("/d", "name", 7).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_filename_index() {
        assert_eq!(filename_index(""), 0);
        assert_eq!(filename_index("noslash"), 0);
        assert_eq!(filename_index("/a/b"), 3);
        assert_eq!(filename_index("dir/"), 4);
        assert_eq!(filename_index("/"), 1);
    }

    #[test]
    fn test_current_user_home_on_real_backend() {
        let pal = zfile_base::RealPal::default();
        let Some(home) = pal.home_directory(None) else {
            return;
        };
        let built = build_path(&pal, "/ignored", "~", MAX).unwrap();
        assert_eq!(built.as_str(), home);
    }
}
