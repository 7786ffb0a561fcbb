use bytes::BytesMut;
use conduit::error::ProtocolError;
use conduit::http::body::{ChunkedDecoder, ChunkedEncoder, CloseDecoder, Decoded, Decoder, FixedDecoder, FixedEncoder};
use conduit::http::framing::FramingMode;

fn decode_chunked(input: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut decoder = ChunkedDecoder::new(1024);
    let mut src = BytesMut::from(input);
    let mut dst = BytesMut::new();
    match decoder.decode(&mut src, &mut dst)? {
        Decoded::Done => Ok(dst.to_vec()),
        Decoded::Partial => panic!("chunked body did not end"),
    }
}

fn encode_chunked(writes: &[&[u8]]) -> BytesMut {
    let mut encoder = ChunkedEncoder::new();
    let mut dst = BytesMut::new();
    for data in writes {
        encoder.encode(data, &mut dst).unwrap();
    }
    encoder.finish(&mut dst);
    dst
}

#[test]
fn test_chunked_wikipedia() {
    assert_eq!(decode_chunked(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n").unwrap(), b"Wikipedia");
}

#[test]
fn test_chunked_encoding_is_reversible() {
    let empty = encode_chunked(&[]);
    assert_eq!(&empty[..], b"0\r\n\r\n");
    assert_eq!(decode_chunked(&empty).unwrap(), b"");

    let binary: Vec<u8> = (0..=255).collect();
    let encoded = encode_chunked(&[&binary[..100], b"", &binary[100..]]);
    assert_eq!(decode_chunked(&encoded).unwrap(), binary);
}

#[test]
fn test_chunked_decoding_resumes_across_refills() {
    let wire = b"a\r\n0123456789\r\n3;ext=1\r\nabc\r\n0\r\n\r\n";
    let mut decoder = ChunkedDecoder::new(1024);
    let mut dst = BytesMut::new();
    let mut src = BytesMut::new();

    for (i, byte) in wire.iter().enumerate() {
        src.extend_from_slice(&[*byte]);
        let progress = decoder.decode(&mut src, &mut dst).unwrap();
        let expected = if i == wire.len() - 1 { Decoded::Done } else { Decoded::Partial };
        assert_eq!(progress, expected, "after byte {i}");
    }
    assert_eq!(&dst[..], b"0123456789abc");
}

#[test]
fn test_chunked_leaves_the_next_message_alone() {
    let mut decoder = ChunkedDecoder::new(1024);
    let mut src = BytesMut::from(&b"1\r\nx\r\n0\r\n\r\nGET / HTTP/1.1\r\n"[..]);
    let mut dst = BytesMut::new();
    assert_eq!(decoder.decode(&mut src, &mut dst).unwrap(), Decoded::Done);
    assert_eq!(&src[..], b"GET / HTTP/1.1\r\n");
}

#[test]
fn test_chunked_errors() {
    assert_eq!(decode_chunked(b"g\r\n").unwrap_err(), ProtocolError::InvalidChunkSize);
    assert_eq!(decode_chunked(b"\r\n").unwrap_err(), ProtocolError::InvalidChunkSize);
    assert_eq!(
        decode_chunked(b"1\r\nxy\r\n").unwrap_err(),
        ProtocolError::MissingChunkTerminator
    );

    let mut decoder = ChunkedDecoder::new(1024);
    let mut src = BytesMut::from(&b"5\r\nab"[..]);
    let mut dst = BytesMut::new();
    assert_eq!(decoder.decode(&mut src, &mut dst).unwrap(), Decoded::Partial);
    assert_eq!(decoder.decode_eof().unwrap_err(), ProtocolError::UnexpectedEof);
}

#[test]
fn test_fixed_length_reads_exactly_n_bytes() {
    let mut decoder = FixedDecoder::new(5);
    let mut src = BytesMut::from(&b"hel"[..]);
    let mut dst = BytesMut::new();

    assert_eq!(decoder.decode(&mut src, &mut dst), Decoded::Partial);
    assert_eq!(decoder.remaining(), 2);

    src.extend_from_slice(b"loNEXT");
    assert_eq!(decoder.decode(&mut src, &mut dst), Decoded::Done);
    assert_eq!(&dst[..], b"hello");
    assert_eq!(&src[..], b"NEXT");
}

#[test]
fn test_fixed_length_encoder_counts() {
    let mut encoder = FixedEncoder::new();
    let mut dst = BytesMut::new();
    encoder.encode(b"abc", &mut dst).unwrap();
    encoder.encode(b"de", &mut dst).unwrap();
    assert_eq!(encoder.written(), 5);
    assert_eq!(&dst[..], b"abcde");
}

#[test]
fn test_close_delimited_reads_until_eof() {
    let mut decoder = CloseDecoder::new();
    let mut src = BytesMut::from(&b"part one, "[..]);
    let mut dst = BytesMut::new();
    assert_eq!(decoder.decode(&mut src, &mut dst), Decoded::Partial);
    src.extend_from_slice(b"part two");
    assert_eq!(decoder.decode(&mut src, &mut dst), Decoded::Partial);
    assert_eq!(decoder.decode_eof(), Decoded::Done);
    assert_eq!(&dst[..], b"part one, part two");
}

#[test]
fn test_decoder_selection() {
    assert!(Decoder::for_mode(FramingMode::None, 1024).is_none());
    assert!(matches!(
        Decoder::for_mode(FramingMode::FixedLength(3), 1024),
        Some(Decoder::Fixed(_))
    ));
    assert!(matches!(
        Decoder::for_mode(FramingMode::Chunked, 1024),
        Some(Decoder::Chunked(_))
    ));
    assert!(matches!(
        Decoder::for_mode(FramingMode::CloseDelimited, 1024),
        Some(Decoder::Close(_))
    ));
}
