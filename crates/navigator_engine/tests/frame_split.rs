use navigator_engine::FrameSplitter;
use pretty_assertions::assert_eq;

#[test]
fn frame_split_across_reads_is_reassembled() {
    let mut frames = FrameSplitter::new();

    assert!(frames.push("data: {\"choices\":[{\"del").is_empty());
    assert!(frames.push("ta\":{\"content\":\"Hi\"}}]}\n\n").is_empty());
    assert!(frames.saw_delimiter());

    let out = frames.push("data: {\"choices\":[]}\n\n");
    assert_eq!(out, vec![r#"{"choices":[{"delta":{"content":"Hi"}}]}"#.to_string()]);
    assert_eq!(frames.pending(), "{\"choices\":[]}\n\n");
}

#[test]
fn several_frames_in_one_read_keep_the_last_buffered() {
    let mut frames = FrameSplitter::new();
    let out = frames.push("data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: {\"c\":3}\n\n");

    assert_eq!(out, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
    assert_eq!(frames.finish(), Some("{\"c\":3}".to_string()));
    assert_eq!(frames.finish(), None);
}

#[test]
fn delimiter_split_across_reads_is_detected() {
    let mut frames = FrameSplitter::new();
    assert!(frames.push("data: {\"a\":1}\n\nda").is_empty());
    let out = frames.push("ta: {\"b\":2}");

    assert_eq!(out, vec!["{\"a\":1}".to_string()]);
    assert_eq!(frames.pending(), "{\"b\":2}");
}

#[test]
fn trailing_delimiter_does_not_merge_frames() {
    let mut frames = FrameSplitter::new();
    assert_eq!(
        frames.push("data: {\"a\":1}\n\ndata: "),
        vec!["{\"a\":1}".to_string()]
    );
    assert!(frames.push("{\"b\":2}").is_empty());
    assert_eq!(
        frames.push("\n\ndata: {\"c\":3}"),
        vec!["{\"b\":2}".to_string()]
    );
}

#[test]
fn text_without_delimiter_stays_buffered() {
    let mut frames = FrameSplitter::new();
    assert!(frames.push("{\"error\": {\"message\": ").is_empty());
    assert!(frames.push("\"model not loaded\"}}").is_empty());

    assert!(!frames.saw_delimiter());
    assert_eq!(
        frames.finish(),
        Some("{\"error\": {\"message\": \"model not loaded\"}}".to_string())
    );
}

#[test]
fn preamble_and_blank_frames_are_skipped() {
    let mut frames = FrameSplitter::new();
    let out = frames.push(": keep-alive\n\ndata: \n\ndata: {\"a\":1}\n\ndata: [DONE]");

    assert_eq!(out, vec!["{\"a\":1}".to_string()]);
    assert_eq!(frames.finish(), Some("[DONE]".to_string()));
}
