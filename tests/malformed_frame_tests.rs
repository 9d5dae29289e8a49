use battleship_link::{Codec, CodecError, FrameBuffer, LoopbackTransport, Message, Transport};

#[test]
fn test_garbage_is_malformed() {
    for frame in [
        &b"not json"[..],
        b"{}",
        b"[1,2,3]",
        b"{\"type\": \"SHOT\", \"seq\": 1}",
        b"{\"type\": \"SHOT\", \"coord\": [1], \"seq\": 1}",
        b"{\"type\": \"SHOT_RESULT\", \"coord\": [1, 1], \"result\": \"GRAZE\", \"seq\": 1}",
        b"{\"type\": \"ROLE_ANNOUNCEMENT\", \"role\": \"KING\", \"seq\": 1}",
        b"{\"type\": \"WAVE\", \"seq\": 1}",
        b"{\"type\": \"HELLO\"}",
        b"   \n",
    ] {
        let err = Codec::decode(frame).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)), "{:?}", err);
    }
}

#[test]
fn test_extra_fields_are_tolerated() {
    let env = Codec::decode(b"{\"type\": \"HELLO\", \"seq\": 3, \"note\": \"hi\"}").unwrap();
    assert_eq!(env.message, Message::Hello);
    assert_eq!(env.seq, 3);
}

#[test]
fn test_bad_frame_does_not_poison_stream() {
    let mut frames = FrameBuffer::new(256);
    let out = frames.push(b"{oops}\n{\"type\": \"SHIPS_PLACED\", \"seq\": 9}\n");
    assert_eq!(out.len(), 2);
    assert!(Codec::decode(out[0].as_ref().unwrap()).is_err());
    let env = Codec::decode(out[1].as_ref().unwrap()).unwrap();
    assert_eq!(env.message, Message::ShipsPlaced);
}

#[test]
fn test_oversize_frame_resyncs_on_next_terminator() {
    let mut frames = FrameBuffer::new(16);
    let out = frames.push(&[b'x'; 40]);
    assert!(matches!(out.as_slice(), [Err(CodecError::FrameTooLarge { .. })]));
    let out = frames.push(b"\n{\"type\":\"HELLO\",\"seq\":0}\n");
    let decoded: Vec<_> = out
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|f| Codec::decode(&f).ok())
        .collect();
    assert_eq!(decoded.len(), 1);
}

#[test]
fn test_loopback_discards_malformed_frames() {
    let (mut a, mut b) = LoopbackTransport::pair();
    a.open();
    b.open();
    a.inject(b"\x00\xff\n{\"type\": \"READY_TO_START\", \"seq\": 5}\n");
    let env = a.try_receive().unwrap();
    assert_eq!(env.message, Message::ReadyToStart);
    assert!(a.try_receive().is_none());
}
