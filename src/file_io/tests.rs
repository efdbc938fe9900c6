use super::*;

#[test]
fn test_fs_input_reads_and_reports_eof() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    std::fs::write(&path, b"hello world").unwrap();

    let mut input = FsFileInput::new(&path).unwrap();
    assert_eq!(input.current_file(), "data.bin");
    assert_eq!(input.file_size().unwrap(), 11);

    let mut buf = [0u8; 6];
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Data(6));
    assert_eq!(&buf, b"hello ");
    // short read marks eof
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Data(5));
    assert_eq!(&buf[..5], b"world");
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Eof);
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Eof);
}

#[test]
fn test_fs_input_exact_size_read_then_eof() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    std::fs::write(&path, b"12345678").unwrap();

    let mut input = FsFileInput::new(&path).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Data(8));
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Eof);
}

#[test]
fn test_fs_input_seek_clears_eof() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    std::fs::write(&path, b"abcdef").unwrap();

    let mut input = FsFileInput::new(&path).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Data(6));
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Eof);
    assert_eq!(input.seek(2, SeekStart::FileStart).unwrap(), 2);
    assert_eq!(input.tell().unwrap(), 2);
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Data(4));
    assert_eq!(&buf[..4], b"cdef");
}

#[test]
fn test_fs_input_open_relative_sibling() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("first.sfv"), b"one").unwrap();
    std::fs::write(dir.path().join("second.bin"), b"two!").unwrap();

    let mut input = FsFileInput::new(&dir.path().join("first.sfv")).unwrap();
    assert!(input.open("second.bin"));
    assert_eq!(input.current_file(), "second.bin");
    let mut buf = [0u8; 4];
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Data(4));
    assert_eq!(&buf, b"two!");

    // failed open keeps the current file usable
    assert!(!input.open("missing.bin"));
    assert_eq!(input.current_file(), "second.bin");
}

#[test]
fn test_fs_output_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.sfv");
    {
        let mut out = FsFileOutput::create(&path).unwrap();
        out.write(b"line one\n").unwrap();
        out.write(b"line two\n").unwrap();
    }
    assert_eq!(std::fs::read(&path).unwrap(), b"line one\nline two\n");
}

#[test]
fn test_memory_input_round() {
    let mut input = MemoryInput::new(&b"0123456789"[..]);
    let mut buf = [0u8; 4];
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Data(4));
    assert_eq!(input.tell().unwrap(), 4);
    input.seek(-2, SeekStart::CurrentPosition).unwrap();
    assert_eq!(input.read(&mut buf).unwrap(), ReadResult::Data(4));
    assert_eq!(&buf, b"2345");
    assert_eq!(input.file_size().unwrap(), 10);
}

#[test]
fn test_memory_output_collects() {
    let mut out = MemoryOutput::new();
    out.write(b"abc").unwrap();
    out.write(b"def").unwrap();
    assert_eq!(out.bytes(), b"abcdef");
}

#[test]
fn test_fs_input_rejects_non_utf8_name() {
    // a path with no file name component
    assert!(FsFileInput::new(std::path::Path::new("/")).is_err());
}

#[test]
fn test_fs_output_truncates_existing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.md5");
    std::fs::write(&path, b"stale contents that are longer").unwrap();
    let mut out = FsFileOutput::create(&path).unwrap();
    out.write(b"payload").unwrap();
    drop(out);
    assert_eq!(std::fs::read(&path).unwrap(), b"payload");
}
