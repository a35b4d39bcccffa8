//! Transparent compression for bucket files.
//!
//! Codecs are picked by file extension first and by magic bytes second, so a
//! `.jsonl.gz` export and a gzip file without the suffix both read correctly.
//!
//! - **Gzip** (`.gz`, `.gzip`) via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`, `.zstd`) via `zstd` (feature: `compression-zstd`)

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// A supported compression format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    #[cfg(feature = "compression-gzip")]
    Gzip,
    #[cfg(feature = "compression-zstd")]
    Zstd,
}

impl Codec {
    /// Every codec compiled into this build.
    pub const ALL: &'static [Self] = &[
        #[cfg(feature = "compression-gzip")]
        Self::Gzip,
        #[cfg(feature = "compression-zstd")]
        Self::Zstd,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => "gzip",
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => "zstd",
        }
    }

    /// Lowercase extensions, including the leading dot.
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => &[".gz", ".gzip"],
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => &[".zst", ".zstd"],
        }
    }

    #[must_use]
    pub const fn magic_bytes(self) -> &'static [u8] {
        match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => &[0x1f, 0x8b],
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
        }
    }

    /// Codec implied by the path's extension, case-insensitively.
    pub fn from_extension(path: impl AsRef<Path>) -> Option<Self> {
        let lower = path.as_ref().to_string_lossy().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.extensions().iter().any(|ext| lower.ends_with(ext)))
    }

    /// Codec whose signature starts `header`.
    #[must_use]
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| header.starts_with(c.magic_bytes()))
    }

    fn wrap_reader(self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => Ok(Box::new(zstd::stream::read::Decoder::new(reader)?)),
        }
    }

    fn wrap_writer(self, writer: BufWriter<File>) -> std::io::Result<Sink> {
        match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Ok(Sink::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            ))),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => Ok(Sink::Zstd(zstd::stream::write::Encoder::new(writer, 3)?)),
        }
    }
}

enum Sink {
    Plain(BufWriter<File>),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<BufWriter<File>>),
    #[cfg(feature = "compression-zstd")]
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<File>>),
}

/// A file opened by [`create_writer`].
///
/// Call [`FileWriter::finish`] once everything is written. Dropping the
/// writer instead discards any error from the final flush, and a compressed
/// file may be left without its trailer.
pub struct FileWriter {
    path: PathBuf,
    sink: Sink,
}

impl FileWriter {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the codec trailer, if any, and flush everything to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder or the file rejects the final write.
    pub fn finish(self) -> Result<()> {
        let path = self.path;
        let mut file = match self.sink {
            Sink::Plain(file) => file,
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(encoder) => encoder
                .finish()
                .with_context(|| format!("finish gzip stream of {}", path.display()))?,
            #[cfg(feature = "compression-zstd")]
            Sink::Zstd(encoder) => encoder
                .finish()
                .with_context(|| format!("finish zstd stream of {}", path.display()))?,
        };
        file.flush().with_context(|| format!("flush {}", path.display()))
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.sink {
            Sink::Plain(w) => w.write(buf),
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(w) => w.write(buf),
            #[cfg(feature = "compression-zstd")]
            Sink::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.sink {
            Sink::Plain(w) => w.flush(),
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(w) => w.flush(),
            #[cfg(feature = "compression-zstd")]
            Sink::Zstd(w) => w.flush(),
        }
    }
}

/// Open `path` for buffered line reading, decompressing when needed.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the decoder cannot start.
pub fn open_reader(path: impl AsRef<Path>) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;

    let mut buffered = BufReader::new(file);
    let codec = match Codec::from_extension(path) {
        Some(codec) => Some(codec),
        None => {
            let header = buffered
                .fill_buf()
                .with_context(|| format!("read header of {}", path.display()))?;
            Codec::from_magic(header)
        }
    };

    match codec {
        Some(codec) => {
            let inner = codec.wrap_reader(Box::new(buffered)).with_context(|| {
                format!("wrap {} with {} decoder", path.display(), codec.name())
            })?;
            Ok(Box::new(BufReader::new(inner)))
        }
        None => Ok(Box::new(buffered)),
    }
}

/// Create `path` for writing, compressing when the extension asks for it.
///
/// The returned writer must be closed with [`FileWriter::finish`].
///
/// # Errors
///
/// Returns an error if the file cannot be created or the encoder cannot start.
pub fn create_writer(path: impl AsRef<Path>) -> Result<FileWriter> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let file = BufWriter::new(file);
    let sink = match Codec::from_extension(path) {
        Some(codec) => codec.wrap_writer(file).with_context(|| {
            format!("wrap {} with {} encoder", path.display(), codec.name())
        })?,
        None => Sink::Plain(file),
    };
    Ok(FileWriter {
        path: path.to_path_buf(),
        sink,
    })
}
