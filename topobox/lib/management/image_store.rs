use std::{
    fs::Metadata,
    io::{self, Read},
    path::{Path, PathBuf},
};

use getset::Getters;

use crate::{utils, TopoboxResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The magic bytes opening a qcow2 header.
const QCOW2_MAGIC: [u8; 4] = [b'Q', b'F', b'I', 0xfb];

/// Format reported for image files without an extension.
const RAW_FORMAT: &str = "raw";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A directory of base disk images nodes boot from, one `<name>.<format>` file per image.
///
/// Images are supplied by the operator; topobox only lists them and checks that the images a
/// template asks for are present.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

/// A base image found in an [`ImageStore`].
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Image {
    /// The name nodes refer to the image by.
    name: String,

    /// The disk format, read from the header for qcow2 and from the extension otherwise.
    format: String,

    /// The size of the disk seen by a node, in bytes.
    virtual_size: u64,

    /// The space the image file takes up on the host, in bytes.
    disk_size: u64,

    /// Where the image lives.
    path: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageStore {
    /// Creates a store reading images from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the directory the images are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns every image, ordered by name.
    pub async fn list(&self) -> TopoboxResult<Vec<Image>> {
        let root = self.root.clone();
        let images = tokio::task::spawn_blocking(move || scan(&root)).await??;
        Ok(images)
    }

    /// Looks up the image called `name`.
    pub async fn find(&self, name: &str) -> TopoboxResult<Option<Image>> {
        if utils::validate_name(name).is_err() {
            return Ok(None);
        }

        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|image| image.name == name))
    }

    /// Returns `true` if an image called `name` is present.
    pub async fn exists(&self, name: &str) -> TopoboxResult<bool> {
        Ok(self.find(name).await?.is_some())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn scan(root: &Path) -> io::Result<Vec<Image>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        match inspect(&path, name, &metadata) {
            Ok(image) => images.push(image),
            Err(e) => tracing::warn!("skipping image {}: {}", path.display(), e),
        }
    }

    images.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(images)
}

fn inspect(path: &Path, name: &str, metadata: &Metadata) -> io::Result<Image> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or(RAW_FORMAT)
        .to_string();

    let mut header = [0u8; 32];
    let read = read_prefix(path, &mut header)?;
    let (format, virtual_size) = if read == header.len() && header[..4] == QCOW2_MAGIC {
        let mut size = [0u8; 8];
        size.copy_from_slice(&header[24..32]);
        ("qcow2".to_string(), u64::from_be_bytes(size))
    } else {
        (extension, metadata.len())
    };

    Ok(Image {
        name: name.to_string(),
        format,
        virtual_size,
        disk_size: allocated_size(metadata),
        path: path.to_path_buf(),
    })
}

fn read_prefix(path: &Path, buf: &mut [u8]) -> io::Result<usize> {
    let mut file = std::fs::File::open(path)?;
    let mut read = 0;
    while read < buf.len() {
        match file.read(&mut buf[read..])? {
            0 => break,
            n => read += n,
        }
    }

    Ok(read)
}

#[cfg(unix)]
fn allocated_size(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.blocks() * 512
}

#[cfg(not(unix))]
fn allocated_size(metadata: &Metadata) -> u64 {
    metadata.len()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn qcow2_header(virtual_size: u64) -> Vec<u8> {
        let mut header = vec![0u8; 512];
        header[..4].copy_from_slice(&QCOW2_MAGIC);
        header[4..8].copy_from_slice(&3u32.to_be_bytes());
        header[24..32].copy_from_slice(&virtual_size.to_be_bytes());
        header
    }

    #[test_log::test(tokio::test)]
    async fn test_image_store_lists_images_by_name() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ImageStore::new(dir.path());

        let ten_gib = 10 * 1024 * 1024 * 1024;
        std::fs::write(dir.path().join("ubuntu.qcow2"), qcow2_header(ten_gib))?;
        std::fs::write(dir.path().join("alpine.img"), vec![1u8; 4096])?;
        std::fs::write(dir.path().join("scratch"), b"")?;
        std::fs::write(dir.path().join(".partial.qcow2"), b"")?;
        std::fs::create_dir(dir.path().join("cache"))?;

        let images = store.list().await?;
        let names: Vec<_> = images.iter().map(|i| i.get_name().as_str()).collect();
        assert_eq!(names, vec!["alpine", "scratch", "ubuntu"]);

        assert_eq!(images[0].get_format(), "img");
        assert_eq!(*images[0].get_virtual_size(), 4096);
        assert_eq!(images[1].get_format(), "raw");
        assert_eq!(images[2].get_format(), "qcow2");
        assert_eq!(*images[2].get_virtual_size(), ten_gib);

        Ok(())
    }

    #[tokio::test]
    async fn test_image_store_exists() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ImageStore::new(dir.path().join("images"));

        assert!(store.list().await?.is_empty());
        assert!(!store.exists("ubuntu").await?);

        std::fs::create_dir(store.root())?;
        std::fs::write(store.root().join("ubuntu.qcow2"), b"not really qcow2")?;
        assert!(store.exists("ubuntu").await?);
        assert!(!store.exists("ubuntu.qcow2").await?);
        assert!(!store.exists("../ubuntu").await?);

        let image = store.find("ubuntu").await?.unwrap();
        assert_eq!(image.get_format(), "qcow2");
        assert_eq!(*image.get_virtual_size(), 16);

        Ok(())
    }
}
