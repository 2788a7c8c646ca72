//! Local directory backed filesystem, the store behind every cache directory.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{CacheError, IoContext, Result};
use crate::fs::{FileReader, FileSystem, FileWriter};

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> Result<bool> {
        path.try_exists().io_context("check local file exists", path)
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileReader>> {
        Ok(Box::new(LocalFileReader::open(path)?))
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn FileWriter>> {
        Ok(Box::new(LocalFileWriter::create(path)?))
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).io_context("delete local file", path)
    }
}

pub struct LocalFileReader {
    file: File,
    path: PathBuf,
    size: u64,
}

impl LocalFileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).io_context("open local file", path)?;
        let size = file
            .metadata()
            .io_context("stat local file", path)?
            .len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
        })
    }
}

impl FileReader for LocalFileReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match positional_read(&self.file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CacheError::io("read local file", &self.path, e)),
            }
        }
        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

pub struct LocalFileWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl LocalFileWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).io_context("create local directory", dir)?;
        }
        let file = File::create(path).io_context("create local file", path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }
}

impl FileWriter for LocalFileWriter {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.writer
            .write_all(data)
            .io_context("write local file", &self.path)
    }

    fn finalize(&mut self) -> Result<()> {
        self.writer
            .flush()
            .io_context("flush local file", &self.path)?;
        self.writer
            .get_ref()
            .sync_all()
            .io_context("sync local file", &self.path)
    }
}
