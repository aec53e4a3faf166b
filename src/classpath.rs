use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Classloader-equivalent lookup of raw class bytes by internal name.
///
/// `Ok(None)` means no configured location carries the class; errors are
/// reserved for I/O failures on locations that should have been readable.
pub trait ClassByteSource: Send + Sync {
    fn class_bytes(&self, class_name: &str) -> Result<Option<Vec<u8>>>;
}

/// Zip entry (or directory-relative path) for an internal class name.
pub fn class_entry_path(class_name: &str) -> String {
    format!("{class_name}.class")
}

/// Searches an ordered list of roots: plain directories resolved by relative
/// path, `.jar` files probed by entry name. First hit wins.
#[derive(Debug, Clone, Default)]
pub struct ClasspathSource {
    roots: Vec<PathBuf>,
}

impl ClasspathSource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn bytes_from_dir(root: &Path, entry: &str) -> Result<Option<Vec<u8>>> {
        let path = root.join(entry);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read class file: {}", path.display()))?;
        Ok(Some(bytes))
    }

    fn bytes_from_jar(jar_path: &Path, entry: &str) -> Result<Option<Vec<u8>>> {
        let file = File::open(jar_path)
            .with_context(|| format!("failed to open jar: {}", jar_path.display()))?;
        // SAFETY: The file is opened read-only and remains valid for the
        // lifetime of the mmap. The mmap is dropped before the file.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to mmap jar: {}", jar_path.display()))?;
        let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
            .with_context(|| format!("failed to read zip structure: {}", jar_path.display()))?;

        let Ok(mut zip_entry) = archive.by_name(entry) else {
            return Ok(None);
        };
        let mut bytes = Vec::with_capacity(zip_entry.size() as usize);
        zip_entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to extract {entry} from {}", jar_path.display()))?;
        Ok(Some(bytes))
    }
}

impl ClassByteSource for ClasspathSource {
    fn class_bytes(&self, class_name: &str) -> Result<Option<Vec<u8>>> {
        let entry = class_entry_path(class_name);
        for root in &self.roots {
            let found = if root.extension().is_some_and(|e| e == "jar") {
                Self::bytes_from_jar(root, &entry)?
            } else {
                Self::bytes_from_dir(root, &entry)?
            };
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }
}
