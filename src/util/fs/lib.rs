/* ************************************************************************ **
** This file is part of kdots, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of kdots is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

#[macro_use]
extern crate log;

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// An io error, with a message saying what we were trying to do.
#[derive(Debug, thiserror::Error)]
#[error("{context}")]
pub struct Error {
    context: String,
    #[source]
    source: io::Error,
}

impl Error {
    pub fn kind(&self) -> io::ErrorKind { self.source.kind() }
}

pub type Result<T> = std::result::Result<T, Error>;

trait ResultExt<T> {
    fn context(self, f: impl FnOnce() -> String) -> Result<T>;
}

impl<T> ResultExt<T> for io::Result<T> {
    fn context(self, f: impl FnOnce() -> String) -> Result<T>
    { self.map_err(|source| Error { context: f(), source }) }
}

/// Wrapper around `File::open` that adds context.
pub fn open(path: impl AsRef<Path>) -> Result<File>
{
    let path = path.as_ref();
    File::open(path)
        .context(|| format!("while opening file: '{}'", path.display()))
}

/// Wrapper around `File::open` that adds context and makes a `BufReader`.
pub fn open_text(path: impl AsRef<Path>) -> Result<BufReader<File>>
{ open(path).map(BufReader::new) }

/// Read a whole text file, with context.
pub fn read_to_string(path: impl AsRef<Path>) -> Result<String>
{
    let path = path.as_ref();
    fs::read_to_string(path)
        .context(|| format!("while reading file: '{}'", path.display()))
}

/// Wrapper around `File::create` that adds context.
pub fn create(path: impl AsRef<Path>) -> Result<File>
{
    let path = path.as_ref();
    File::create(path)
        .context(|| format!("could not create file: '{}'", path.display()))
}

/// Wrapper around `std::fs::create_dir_all` that adds context.
pub fn create_dir_all(dir: impl AsRef<Path>) -> Result<()>
{
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .context(|| format!("could not create directory '{}'", dir.display()))
}

/// Wrapper around `std::fs::rename` that adds context.
pub fn rename(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()>
{
    let (src, dest) = (src.as_ref(), dest.as_ref());
    fs::rename(src, dest)
        .context(|| format!("could not rename '{}' to '{}'", src.display(), dest.display()))
}

/// Wrapper around `std::fs::remove_file` that adds context.
pub fn remove_file(path: impl AsRef<Path>) -> Result<()>
{
    let path = path.as_ref();
    fs::remove_file(path)
        .context(|| format!("could not remove file: '{}'", path.display()))
}

/// Simulates `rm -rf`.
///
/// Properties:
/// * Deletes files and folders alike.
/// * Does not require the path or its ancestors to exist.
/// * **Does** fail if other problems occur (e.g. insufficient permissions).
pub fn rm_rf(path: impl AsRef<Path>) -> Result<()>
{
    let path = path.as_ref();
    let result = match path.is_dir() {
        true => fs::remove_dir_all(path),
        false => fs::remove_file(path),
    };
    match result {
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        r => r.context(|| format!("could not delete: {}", path.display())),
    }
}

/// The name that `write_then_rename` uses for `path` while it is being written.
pub fn partial_path(path: impl AsRef<Path>) -> PathBuf
{
    let path = path.as_ref();
    let mut name = path.file_name().map(|s| s.to_owned()).unwrap_or_else(OsString::new);
    name.push(".partial");
    path.with_file_name(name)
}

/// Write a file under a temporary name, and only move it to `path` once the
/// closure has succeeded and everything is flushed.
///
/// On failure the partial file is removed, and anything previously at `path`
/// is left untouched.
pub fn write_then_rename<P, F, E>(path: P, write: F) -> std::result::Result<(), E>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<File>) -> std::result::Result<(), E>,
    E: From<Error>,
{
    let mut files = PartialFiles::new();
    files.write(path, write)?;
    Ok(files.commit()?)
}

/// Several files written under temporary names, then moved into place together.
///
/// Nothing is renamed until every file has been written, so a failure partway
/// through leaves all of the previous files in place. Partial files that were
/// never committed are removed on drop.
#[derive(Debug, Default)]
pub struct PartialFiles {
    // final destinations
    pending: Vec<PathBuf>,
}

impl PartialFiles {
    pub fn new() -> Self
    { Default::default() }

    /// Write the partial file for `path`.
    pub fn write<P, F, E>(&mut self, path: P, write: F) -> std::result::Result<(), E>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut BufWriter<File>) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        let path = path.as_ref();
        self.pending.push(path.to_owned());
        write_partial(&partial_path(path), write)
    }

    /// Move every partial file to its final name.
    pub fn commit(mut self) -> Result<()> {
        for path in &self.pending {
            rename(partial_path(path), path)?;
        }
        self.pending.clear();
        Ok(())
    }
}

impl Drop for PartialFiles {
    fn drop(&mut self) {
        for path in &self.pending {
            if let Err(e) = rm_rf(partial_path(path)) {
                warn!("{}", e);
            }
        }
    }
}

fn write_partial<F, E>(partial: &Path, write: F) -> std::result::Result<(), E>
where
    F: FnOnce(&mut BufWriter<File>) -> std::result::Result<(), E>,
    E: From<Error>,
{
    let mut w = BufWriter::new(create(partial)?);
    write(&mut w)?;
    w.flush().context(|| format!("could not write: '{}'", partial.display()))?;
    Ok(())
}
