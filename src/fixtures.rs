//! Synthetic fixture files
//!
//! Every generator removes whatever is at the target path first, so a
//! fixture is never a partially rewritten leftover from an earlier run.
//! Large files are written in bounded chunks rather than built in memory.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::paths::{remove_dir_if_exists, remove_file_if_exists};
use crate::common::{Error, Result, MIB};

/// Largest buffer used when writing fixture content
pub const WRITE_CHUNK: u64 = MIB;

/// Size of one non-null or one null block in a partial-sparse file
pub const SPARSE_UNIT: u64 = 4 * MIB;

/// Byte used for non-null fixture content
const FILL_BYTE: u8 = b'0';

/// Content pattern of a generated file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// Every byte is the fill byte
    #[default]
    Uniform,
    /// Logical length only, no content written
    FullSparse,
    /// Alternating 4 MiB of content and 4 MiB of NUL bytes
    PartialSparse,
}

impl Pattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Uniform => "uniform",
            Pattern::FullSparse => "full-sparse",
            Pattern::PartialSparse => "partial-sparse",
        }
    }

    /// Generate a file of this pattern at `path`
    pub fn generate(&self, path: &Path, size: u64) -> Result<PathBuf> {
        match self {
            Pattern::Uniform => uniform(path, size),
            Pattern::FullSparse => full_sparse(path, size),
            Pattern::PartialSparse => partial_sparse(path, size),
        }
    }
}

impl std::str::FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(Pattern::Uniform),
            "full-sparse" => Ok(Pattern::FullSparse),
            "partial-sparse" => Ok(Pattern::PartialSparse),
            other => Err(Error::Config(format!(
                "Unknown fixture pattern '{}'. Supported: uniform, full-sparse, partial-sparse",
                other
            ))),
        }
    }
}

/// Write `len` copies of `byte`, at most [`WRITE_CHUNK`] bytes at a time
fn write_repeated<W: Write>(writer: &mut W, byte: u8, len: u64) -> Result<()> {
    let chunk = vec![byte; len.min(WRITE_CHUNK) as usize];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        writer.write_all(&chunk[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

/// Create a file of exactly `size` fill bytes
pub fn uniform(path: &Path, size: u64) -> Result<PathBuf> {
    remove_file_if_exists(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_repeated(&mut writer, FILL_BYTE, size)?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), size, "generated uniform fixture");
    Ok(path.to_path_buf())
}

/// Create an empty file whose logical length is `size`
///
/// No content is written, so on filesystems with hole support the whole
/// file is one null range.
pub fn full_sparse(path: &Path, size: u64) -> Result<PathBuf> {
    remove_file_if_exists(path)?;
    let file = File::create(path)?;
    file.set_len(size)?;
    tracing::debug!(path = %path.display(), size, "generated full-sparse fixture");
    Ok(path.to_path_buf())
}

/// Create a file of alternating 4 MiB content and 4 MiB NUL blocks
///
/// `size` must be a positive multiple of 8 MiB. Otherwise no file is left
/// at `path` and [`Error::FixturePrecondition`] is returned.
pub fn partial_sparse(path: &Path, size: u64) -> Result<PathBuf> {
    remove_file_if_exists(path)?;

    let pair = 2 * SPARSE_UNIT;
    if size == 0 || size % pair != 0 {
        return Err(Error::fixture_precondition(
            Pattern::PartialSparse.as_str(),
            size,
            format!("size must be a positive multiple of {} bytes", pair),
        ));
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for _ in 0..size / pair {
        write_repeated(&mut writer, FILL_BYTE, SPARSE_UNIT)?;
        write_repeated(&mut writer, 0, SPARSE_UNIT)?;
    }
    writer.flush()?;
    tracing::debug!(path = %path.display(), size, "generated partial-sparse fixture");
    Ok(path.to_path_buf())
}

/// Remove and recreate an empty directory
pub fn directory(path: &Path) -> Result<PathBuf> {
    remove_dir_if_exists(path)?;
    fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

/// Name of the `index`-th file created by [`n_files`]
///
/// Derived only from count and size so re-runs produce the same names.
pub fn n_files_name(size: u64, count: usize, index: usize) -> String {
    format!("test{}{}_{}.txt", count, size, index)
}

/// Recreate `dir` and fill it with `count` uniform files of `size` bytes
pub fn n_files(size: u64, count: usize, dir: &Path) -> Result<PathBuf> {
    directory(dir)?;
    for index in 0..count {
        uniform(&dir.join(n_files_name(size, count, index)), size)?;
    }
    tracing::debug!(dir = %dir.display(), size, count, "generated fixture directory");
    Ok(dir.to_path_buf())
}

/// Write `contents` to `path`, replacing any existing file
pub fn file_with_contents(path: &Path, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
    remove_file_if_exists(path)?;
    fs::write(path, contents)?;
    Ok(path.to_path_buf())
}

/// Serialize `value` as JSON into `path`
pub fn json_file<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    let body = serde_json::to_vec(value)?;
    file_with_contents(path, body)
}

/// Write `lines` into `path`, one per line
///
/// Used for the `--list-of-files` style inputs.
pub fn list_file<I, S>(path: &Path, lines: I) -> Result<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut body = String::new();
    for line in lines {
        body.push_str(line.as_ref());
        body.push('\n');
    }
    file_with_contents(path, body)
}

/// Small HTML page, used to exercise content-type guessing
pub fn html_file(path: &Path) -> Result<PathBuf> {
    file_with_contents(
        path,
        "<html>\n    <head></head>\n        <body><p>Hello World!</p></body>\n</html>",
    )
}

/// Create a hidden file named after `name` inside `dir`
///
/// On Windows the file keeps its name and is created with the hidden
/// attribute; elsewhere the name gets a `.` prefix.
#[cfg(windows)]
pub fn hidden_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    let path = dir.join(name);
    remove_file_if_exists(&path)?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .attributes(FILE_ATTRIBUTE_HIDDEN)
        .open(&path)?;
    file.write_all(contents.as_ref())?;
    Ok(path)
}

/// Create a hidden file named after `name` inside `dir`
///
/// On Windows the file keeps its name and is created with the hidden
/// attribute; elsewhere the name gets a `.` prefix.
#[cfg(not(windows))]
pub fn hidden_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
    file_with_contents(&dir.join(format!(".{}", name)), contents)
}

/// Deterministic pseudo-random bytes for content that must not compress
pub fn random_bytes(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut bytes = vec![0u8; size];
    rng.fill(&mut bytes);
    bytes
}

/// Unique resource name, e.g. for blobs that must not collide between scenarios
pub fn resource_name(prefix: &str) -> String {
    format!("{}{}", prefix, uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn count_content_ranges(path: &Path) -> usize {
        let mut file = File::open(path).unwrap();
        let mut block = vec![0u8; SPARSE_UNIT as usize];
        let mut ranges = 0;
        let mut previous_was_content = false;
        loop {
            let mut filled = 0;
            while filled < block.len() {
                let n = file.read(&mut block[filled..]).unwrap();
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            let is_content = block[..filled].iter().any(|b| *b != 0);
            if is_content && !previous_was_content {
                ranges += 1;
            }
            previous_was_content = is_content;
        }
        ranges
    }

    #[test]
    fn test_uniform_exact_sizes() {
        let tmp = tempfile::tempdir().unwrap();
        for size in [0, 1, 1024, MIB - 1, MIB, MIB + 17, 3 * MIB] {
            let path = uniform(&tmp.path().join("u.txt"), size).unwrap();
            assert_eq!(fs::metadata(&path).unwrap().len(), size, "size {}", size);
        }
        let bytes = fs::read(tmp.path().join("u.txt")).unwrap();
        assert!(bytes.iter().all(|b| *b == b'0'));
    }

    #[test]
    fn test_uniform_replaces_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("u.txt");
        fs::write(&path, vec![b'x'; 4096]).unwrap();
        uniform(&path, 10).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"0000000000");
    }

    #[test]
    fn test_full_sparse_logical_length() {
        let tmp = tempfile::tempdir().unwrap();
        let path = full_sparse(&tmp.path().join("sparse"), 16 * MIB).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 16 * MIB);
        assert_eq!(count_content_ranges(&path), 0);
    }

    #[test]
    fn test_partial_sparse_ranges() {
        let tmp = tempfile::tempdir().unwrap();
        for size in [8 * MIB, 24 * MIB] {
            let path = partial_sparse(&tmp.path().join("partial"), size).unwrap();
            assert_eq!(fs::metadata(&path).unwrap().len(), size);
            assert_eq!(count_content_ranges(&path) as u64, size / (2 * SPARSE_UNIT));
        }
    }

    #[test]
    fn test_partial_sparse_refuses_bad_sizes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("partial");
        fs::write(&path, "stale").unwrap();

        for size in [0, 4 * MIB, 8 * MIB + 1, 12 * MIB] {
            let err = partial_sparse(&path, size).unwrap_err();
            assert!(matches!(err, Error::FixturePrecondition { .. }), "size {}", size);
            assert!(!path.exists(), "no file should remain for size {}", size);
        }
    }

    #[test]
    fn test_n_files_recreates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("dir_10_files");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("leftover.txt"), "x").unwrap();

        n_files(1024, 10, &dir).unwrap();

        let mut names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 10);
        assert!(!names.contains(&"leftover.txt".to_string()));
        assert!(names.contains(&"test101024_0.txt".to_string()));
        for name in names {
            assert_eq!(fs::metadata(dir.join(name)).unwrap().len(), 1024);
        }
    }

    #[test]
    fn test_pattern_parse_and_generate() {
        let tmp = tempfile::tempdir().unwrap();
        let pattern: Pattern = "full-sparse".parse().unwrap();
        assert_eq!(pattern, Pattern::FullSparse);
        let path = pattern.generate(&tmp.path().join("f"), 2048).unwrap();
        assert_eq!(fs::metadata(path).unwrap().len(), 2048);
        assert!("zeros".parse::<Pattern>().is_err());
    }

    #[test]
    fn test_random_bytes_are_deterministic() {
        assert_eq!(random_bytes(64, 7), random_bytes(64, 7));
        assert_ne!(random_bytes(64, 7), random_bytes(64, 8));
    }

    #[test]
    fn test_list_and_hidden_files() {
        let tmp = tempfile::tempdir().unwrap();
        let list = list_file(&tmp.path().join("list.txt"), ["a", "b/c"]).unwrap();
        assert_eq!(fs::read_to_string(list).unwrap(), "a\nb/c\n");

        let hidden = hidden_file(tmp.path(), "secret", "data").unwrap();
        assert_eq!(fs::read_to_string(&hidden).unwrap(), "data");
        #[cfg(unix)]
        assert!(hidden.file_name().unwrap().to_string_lossy().starts_with('.'));
        #[cfg(windows)]
        {
            use std::os::windows::fs::MetadataExt;
            assert_eq!(hidden.file_name().unwrap(), "secret");
            assert_ne!(fs::metadata(&hidden).unwrap().file_attributes() & 0x2, 0);
        }
    }

    #[test]
    fn test_json_and_html_files() {
        let tmp = tempfile::tempdir().unwrap();
        let json = json_file(
            &tmp.path().join("data.json"),
            &serde_json::json!({ "name": "blob", "size": 3 }),
        )
        .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(value["name"], "blob");
        assert_eq!(value["size"], 3);

        let html = html_file(&tmp.path().join("index.html")).unwrap();
        let body = fs::read_to_string(&html).unwrap();
        assert!(body.starts_with("<html>"));
        assert!(body.contains("Hello World!"));

        // regenerating replaces the earlier content
        json_file(&html, &vec![1, 2]).unwrap();
        assert_eq!(fs::read_to_string(&html).unwrap(), "[1,2]");
    }

    #[test]
    fn test_resource_names_are_unique() {
        let a = resource_name("blob");
        let b = resource_name("blob");
        assert!(a.starts_with("blob"));
        assert_ne!(a, b);
        assert!(!a.contains('-'));
    }
}
