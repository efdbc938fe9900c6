use super::*;

use crate::error::{Error, Result};
use crate::file_io::MemoryInput;

fn read_all(data: impl Into<Vec<u8>>) -> Result<Vec<String>> {
    let mut input = MemoryInput::new(data);
    let mut reader = LineReader::new(&mut input);
    let mut lines = Vec::new();
    loop {
        match reader.read_line()? {
            Some(line) => lines.push(line),
            None => {
                if reader.done() {
                    break;
                }
            }
        }
    }
    Ok(lines)
}

#[test]
fn test_empty_input_yields_no_lines() {
    assert_eq!(read_all(b"".to_vec()).unwrap(), Vec::<String>::new());
}

#[test]
fn test_lf_and_crlf_terminators() {
    let lines = read_all(b"one\ntwo\r\nthree\n".to_vec()).unwrap();
    assert_eq!(lines, ["one", "two", "three"]);
}

#[test]
fn test_final_line_without_terminator() {
    let lines = read_all(b"one\ntwo".to_vec()).unwrap();
    assert_eq!(lines, ["one", "two"]);
}

#[test]
fn test_final_line_with_trailing_cr() {
    let lines = read_all(b"one\ntwo\r".to_vec()).unwrap();
    assert_eq!(lines, ["one", "two"]);
}

#[test]
fn test_lone_cr_is_not_a_separator() {
    let lines = read_all(b"one\rstill one\ntwo\n".to_vec()).unwrap();
    assert_eq!(lines, ["one\rstill one", "two"]);
}

#[test]
fn test_empty_lines_are_preserved() {
    let lines = read_all(b"\n\na\n\n".to_vec()).unwrap();
    assert_eq!(lines, ["", "", "a", ""]);
}

#[test]
fn test_line_spanning_buffer_boundary() {
    // 65,535 'A's followed by "\r\nBBB": the first line straddles the two
    // 64 KiB buffers, the CR sits at the very end of the front buffer.
    let mut data = vec![b'A'; READ_BUFFER_SIZE - 1];
    data.extend_from_slice(b"\r\nBBB");
    let lines = read_all(data).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].len(), READ_BUFFER_SIZE - 1);
    assert!(lines[0].bytes().all(|b| b == b'A'));
    assert_eq!(lines[1], "BBB");
}

#[test]
fn test_newline_exactly_at_buffer_boundary() {
    let mut data = vec![b'x'; READ_BUFFER_SIZE - 1];
    data.push(b'\n');
    data.extend_from_slice(b"tail\n");
    let lines = read_all(data).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].len(), READ_BUFFER_SIZE - 1);
    assert_eq!(lines[1], "tail");
}

#[test]
fn test_many_lines_across_many_buffers() {
    let mut data = Vec::new();
    for i in 0..10_000 {
        data.extend_from_slice(format!("line number {}\n", i).as_bytes());
    }
    let lines = read_all(data).unwrap();
    assert_eq!(lines.len(), 10_000);
    assert_eq!(lines[0], "line number 0");
    assert_eq!(lines[9_999], "line number 9999");
}

#[test]
fn test_oversize_line_is_rejected() {
    // a single unterminated line filling both buffers
    let data = vec![b'A'; 2 * READ_BUFFER_SIZE + 10];
    assert!(matches!(read_all(data), Err(Error::Parser)));
}

#[test]
fn test_invalid_utf8_is_rejected() {
    assert!(matches!(
        read_all(b"ok line\n\xc0\xafbad\n".to_vec()),
        Err(Error::Parser)
    ));
    // stray continuation byte in the final unterminated line
    assert!(matches!(read_all(b"ok\n\x80".to_vec()), Err(Error::Parser)));
}

#[test]
fn test_multibyte_utf8_across_boundary() {
    // place a 2-byte code point so it straddles the buffer boundary
    let mut data = vec![b'a'; READ_BUFFER_SIZE - 1];
    data.extend_from_slice("é".as_bytes());
    data.extend_from_slice(b"\nnext\n");
    let lines = read_all(data).unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with('é'));
    assert_eq!(lines[1], "next");
}

#[test]
fn test_done_only_after_exhaustion() {
    let mut input = MemoryInput::new(&b"a\nb\n"[..]);
    let mut reader = LineReader::new(&mut input);
    assert!(!reader.done());
    assert_eq!(reader.read_line().unwrap().as_deref(), Some("a"));
    assert!(!reader.done());
    assert_eq!(reader.read_line().unwrap().as_deref(), Some("b"));
    assert_eq!(reader.read_line().unwrap(), None);
    assert!(reader.done());
}
