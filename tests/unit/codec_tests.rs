use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use agent_toolbox::rpc::codec::{ToolCodec, MAX_LINE_BYTES};
use agent_toolbox::AppError;

#[test]
fn decodes_complete_line() {
    let mut codec = ToolCodec::new();
    let mut buf = BytesMut::from("{\"tool\":\"bash\"}\n");

    let line = codec.decode(&mut buf).expect("decode");
    assert_eq!(line, Some("{\"tool\":\"bash\"}".to_owned()));
}

#[test]
fn buffers_partial_line() {
    let mut codec = ToolCodec::new();
    let mut buf = BytesMut::from("{\"tool\":");

    assert_eq!(codec.decode(&mut buf).expect("decode"), None);

    buf.extend_from_slice(b"\"bash\"}\n");
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some("{\"tool\":\"bash\"}".to_owned())
    );
}

#[test]
fn decodes_batched_lines_in_order() {
    let mut codec = ToolCodec::new();
    let mut buf = BytesMut::from("first\nsecond\n");

    assert_eq!(codec.decode(&mut buf).expect("decode"), Some("first".to_owned()));
    assert_eq!(codec.decode(&mut buf).expect("decode"), Some("second".to_owned()));
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
}

#[test]
fn final_unterminated_line_is_decoded_at_eof() {
    let mut codec = ToolCodec::new();
    let mut buf = BytesMut::from("last");

    assert_eq!(codec.decode_eof(&mut buf).expect("decode"), Some("last".to_owned()));
}

#[test]
fn oversized_line_is_a_protocol_error() {
    let mut codec = ToolCodec::new();
    let mut buf = BytesMut::from("x".repeat(MAX_LINE_BYTES + 1).as_str());

    let err = codec.decode(&mut buf).expect_err("line too long");
    assert!(matches!(err, AppError::Protocol(msg) if msg.contains("line too long")));
}

#[test]
fn encodes_with_newline() {
    let mut codec = ToolCodec::new();
    let mut buf = BytesMut::new();

    codec.encode("{\"id\":1}".to_owned(), &mut buf).expect("encode");
    assert_eq!(&buf[..], b"{\"id\":1}\n");
}
