//! Disk I/O for the target file.
//!
//! Opens the target without truncation so earlier progress survives, grows it
//! to the full length up front (fallocate on Linux when available, else
//! set_len), and supports concurrent positioned writes (pwrite) from every
//! segment worker through one shared handle.

mod builder;
mod writer;

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

/// Current length of the file at `path`, or `None` if it does not exist.
pub fn file_len(path: &std::path::Path) -> Option<u64> {
    std::fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn open_allocate_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.bin");

        let mut builder = StorageWriterBuilder::open_or_create(&path).unwrap();
        builder.allocate(100).unwrap();
        let writer = builder.build();

        writer.write_at(0, b"hello").unwrap();
        writer.write_at(50, b"world").unwrap();
        writer.write_at(95, b"xy").unwrap();
        writer.sync().unwrap();

        assert_eq!(file_len(&path), Some(100));
        let mut f = std::fs::File::open(&path).unwrap();
        let mut buf = vec![0u8; 100];
        f.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[0..5], b"hello");
        assert_eq!(&buf[50..55], b"world");
        assert_eq!(&buf[95..97], b"xy");
    }

    #[test]
    fn reopen_keeps_existing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.bin");
        {
            let mut builder = StorageWriterBuilder::open_or_create(&path).unwrap();
            builder.allocate(20).unwrap();
            builder.build().write_at(0, b"keep").unwrap();
        }
        let mut builder = StorageWriterBuilder::open_or_create(&path).unwrap();
        builder.allocate(20).unwrap();
        let writer = builder.build();
        writer.write_at(10, b"more").unwrap();
        let content = std::fs::read(&path).unwrap();
        assert_eq!(content.len(), 20);
        assert_eq!(&content[0..4], b"keep");
        assert_eq!(&content[10..14], b"more");
    }

    #[test]
    fn allocate_shrinks_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.bin");
        std::fs::write(&path, vec![7u8; 64]).unwrap();
        let mut builder = StorageWriterBuilder::open_or_create(&path).unwrap();
        builder.allocate(16).unwrap();
        assert_eq!(file_len(&path), Some(16));
    }

    #[test]
    fn write_at_concurrent_style() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut builder = StorageWriterBuilder::open_or_create(&path).unwrap();
        builder.allocate(20).unwrap();
        let writer = builder.build();
        let handles: Vec<_> = [(0u64, b"aaaa"), (4, b"cccc"), (10, b"bbbb")]
            .into_iter()
            .map(|(off, data)| {
                let w = writer.clone();
                std::thread::spawn(move || w.write_at(off, data).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        writer.sync().unwrap();
        let buf = std::fs::read(&path).unwrap();
        assert_eq!(&buf[0..4], b"aaaa");
        assert_eq!(&buf[4..8], b"cccc");
        assert_eq!(&buf[10..14], b"bbbb");
    }

    #[test]
    fn file_len_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(file_len(&dir.path().join("nope")), None);
        assert_eq!(file_len(dir.path()), None);
    }
}
