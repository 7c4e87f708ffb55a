//! Embedded path recovery.
//!
//! Engine textures frequently sit a few bytes after the path string they were
//! streamed from. Scanning backward from a header for `.ddx`-style literals
//! recovers the original asset path, which becomes the output filename and
//! the manifest's `OriginalPath`.

/// How far before a header the path search reaches.
pub const DEFAULT_MAX_DIST: usize = 512;

const MIN_PATH_LEN: usize = 5;
const MAX_PATH_LEN: usize = 260;

fn is_path_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'/' | b'\\' | b' ')
}

fn eq_ignore_case(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Find the position of `needle` (ASCII, case-insensitive) in `hay`,
/// searching from the end.
fn rfind_ignore_case(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (0..=hay.len() - needle.len())
        .rev()
        .find(|&i| eq_ignore_case(&hay[i..i + needle.len()], needle))
}

/// Scan the bytes immediately preceding `header_offset` for a path literal
/// ending in `extension` (e.g. `".ddx"`, case-insensitive). Walks backward
/// over valid path characters from the extension, then snaps the start
/// forward to a `textures\` or `meshes\` root when one is present inside the
/// candidate. Paths shorter than 5 or longer than 260 characters are
/// rejected.
pub fn find_preceding_path(
    bytes: &[u8],
    header_offset: usize,
    extension: &str,
    max_dist: usize,
) -> Option<String> {
    let region_start = header_offset.saturating_sub(max_dist);
    let region = bytes.get(region_start..header_offset)?;
    let ext = extension.as_bytes();

    let ext_pos = rfind_ignore_case(region, ext)?;
    let path_end = ext_pos + ext.len();

    let mut path_start = ext_pos;
    while path_start > 0 && is_path_char(region[path_start - 1]) {
        path_start -= 1;
    }

    let candidate = &region[path_start..path_end];
    for root in [b"textures\\".as_slice(), b"meshes\\".as_slice()] {
        if let Some(idx) = find_ignore_case(candidate, root) {
            path_start += idx;
            break;
        }
    }

    let path = &region[path_start..path_end];
    if path.len() < MIN_PATH_LEN || path.len() > MAX_PATH_LEN {
        return None;
    }
    if !eq_ignore_case(&path[path.len() - ext.len()..], ext) {
        return None;
    }

    Some(String::from_utf8_lossy(path).into_owned())
}

fn find_ignore_case(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| eq_ignore_case(&hay[i..i + needle.len()], needle))
}

/// Last path component without its extension, sanitized to a filename stem.
pub fn stem_of(path: &str) -> Option<String> {
    let name = path.rsplit(['\\', '/']).next()?;
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_header(prefix: &[u8]) -> (Vec<u8>, usize) {
        let mut buf = prefix.to_vec();
        let header = buf.len();
        buf.extend_from_slice(b"3XDO");
        (buf, header)
    }

    #[test]
    fn recovers_texture_path() {
        let (buf, at) = with_header(b"textures\\a\\b.ddx\0");
        let path = find_preceding_path(&buf, at, ".ddx", DEFAULT_MAX_DIST).expect("path");
        assert_eq!(path, "textures\\a\\b.ddx");
    }

    #[test]
    fn stable_under_leading_garbage() {
        for pad in [0usize, 1, 7, 64, 300] {
            let mut prefix = vec![0xCCu8; pad];
            prefix.extend_from_slice(b"\0textures\\a\\b.ddx\0\0\0");
            let (buf, at) = with_header(&prefix);
            let path = find_preceding_path(&buf, at, ".ddx", DEFAULT_MAX_DIST).expect("path");
            assert_eq!(path, "textures\\a\\b.ddx", "pad={pad}");
        }
    }

    #[test]
    fn snaps_to_textures_root() {
        let (buf, at) = with_header(b"Data Files textures\\rocks\\granite.ddx\0");
        let path = find_preceding_path(&buf, at, ".ddx", DEFAULT_MAX_DIST).expect("path");
        assert_eq!(path, "textures\\rocks\\granite.ddx");
    }

    #[test]
    fn rejects_too_short() {
        let (buf, at) = with_header(b"\0.ddx\0");
        assert!(find_preceding_path(&buf, at, ".ddx", DEFAULT_MAX_DIST).is_none());
    }

    #[test]
    fn case_insensitive_extension() {
        let (buf, at) = with_header(b"textures\\UI\\icon.DDX\0");
        let path = find_preceding_path(&buf, at, ".ddx", DEFAULT_MAX_DIST).expect("path");
        assert_eq!(path, "textures\\UI\\icon.DDX");
    }

    #[test]
    fn no_path_returns_none() {
        let (buf, at) = with_header(&[0u8; 64]);
        assert!(find_preceding_path(&buf, at, ".ddx", DEFAULT_MAX_DIST).is_none());
    }

    #[test]
    fn stem_sanitizes() {
        assert_eq!(
            stem_of("textures\\a\\bark01.ddx").as_deref(),
            Some("bark01")
        );
        assert_eq!(stem_of("weird name.ddx").as_deref(), Some("weird_name"));
        assert!(stem_of("").is_none());
    }
}
