// ABOUTME: Property tests for the multiplexed stream decoder.
// ABOUTME: Decoding never panics, preserves frame order, and tolerates truncation.

use proptest::prelude::*;
use sandcastle::stream::{Frame, HEADER_LEN, StreamKind, decode, encode, encode_frame};

fn stream_kind() -> impl Strategy<Value = StreamKind> {
    prop_oneof![Just(StreamKind::Stdout), Just(StreamKind::Stderr)]
}

fn frames() -> impl Strategy<Value = Vec<(StreamKind, Vec<u8>)>> {
    prop::collection::vec(
        (stream_kind(), prop::collection::vec(any::<u8>(), 0..64)),
        0..12,
    )
}

fn to_frames(input: &[(StreamKind, Vec<u8>)]) -> Vec<Frame> {
    input
        .iter()
        .map(|(stream, payload)| Frame {
            stream: *stream,
            payload: payload.clone(),
        })
        .collect()
}

proptest! {
    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&bytes);
    }

    #[test]
    fn encoded_frames_decode_in_order(input in frames()) {
        let buf = encode(input.iter().map(|(s, p)| (*s, p.as_slice())));
        prop_assert_eq!(decode(&buf), to_frames(&input));
    }

    #[test]
    fn truncation_yields_a_prefix_of_frames(input in frames(), cut in any::<prop::sample::Index>()) {
        let buf = encode(input.iter().map(|(s, p)| (*s, p.as_slice())));
        let cut = cut.index(buf.len() + 1);
        let decoded = decode(&buf[..cut]);
        let expected = to_frames(&input);

        prop_assert!(decoded.len() <= expected.len());
        prop_assert_eq!(&decoded[..], &expected[..decoded.len()]);
    }

    #[test]
    fn unknown_tags_are_skipped(
        input in frames(),
        tag in 3u8..=255,
        junk in prop::collection::vec(any::<u8>(), 0..16),
    ) {
        let mut buf = Vec::new();
        buf.push(tag);
        buf.extend_from_slice(&[0, 0, 0]);
        buf.extend_from_slice(&(junk.len() as u32).to_be_bytes());
        buf.extend_from_slice(&junk);
        for (stream, payload) in &input {
            encode_frame(*stream, payload, &mut buf);
        }
        prop_assert_eq!(decode(&buf), to_frames(&input));
    }
}

#[test]
fn hello_frame_layout() {
    let buf = encode([(StreamKind::Stdout, &b"hello"[..])]);
    assert_eq!(buf, [1, 0, 0, 0, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
    assert_eq!(buf.len(), HEADER_LEN + 5);
}

#[test]
fn short_header_is_ignored() {
    assert!(decode(&[1, 0, 0, 0, 0]).is_empty());
    assert!(decode(&[]).is_empty());
}

#[test]
fn oversized_length_stops_decoding() {
    let mut buf = encode([(StreamKind::Stderr, &b"err"[..])]);
    buf.extend_from_slice(&[1, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, b'x']);
    let frames = decode(&buf);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].stream, StreamKind::Stderr);
    assert_eq!(frames[0].payload, b"err");
}
