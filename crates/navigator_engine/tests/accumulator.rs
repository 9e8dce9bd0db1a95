use navigator_engine::{
    parse_frame, FailureKind, FrameEvent, StreamAccumulator, EMPTY_REPLY_MESSAGE,
};
use pretty_assertions::assert_eq;

fn frame(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "choices": [{ "delta": { "content": content }, "finish_reason": null }] })
    )
}

fn stop_frame() -> String {
    "data: {\"choices\":[{\"delta\":{\"content\":\"IGNORED\"},\"finish_reason\":\"stop\"}]}\n\n"
        .to_string()
}

#[test]
fn parse_frame_extracts_deltas() {
    assert_eq!(
        parse_frame(r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#).unwrap(),
        FrameEvent::Delta("Hello".to_string())
    );
    assert_eq!(
        parse_frame(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
        FrameEvent::Empty
    );
    assert_eq!(
        parse_frame(r#"{"choices":[{"delta":{"content":"x"},"finish_reason":"stop"}]}"#).unwrap(),
        FrameEvent::Stop
    );
    assert_eq!(parse_frame(r#"{"choices":[]}"#).unwrap(), FrameEvent::Empty);
    assert_eq!(parse_frame(" [DONE] ").unwrap(), FrameEvent::Done);
}

#[test]
fn parse_frame_reports_errors() {
    let err = parse_frame(r#"{"error":{"message":"rate limited"}}"#).unwrap_err();
    assert_eq!(err.kind, FailureKind::ServerError);
    assert_eq!(err.message, "rate limited");

    let err = parse_frame(r#"{"choices":[{"delta""#).unwrap_err();
    assert_eq!(err.kind, FailureKind::MalformedFrame);
}

#[test]
fn deltas_arrive_in_order_across_arbitrary_reads() {
    let body = [frame("Two "), frame("pump "), frame("failures."), stop_frame()].concat();
    // Feed in 7-byte reads to split frames at awkward places.
    let mut acc = StreamAccumulator::new();
    let mut seen = Vec::new();
    let chars: Vec<char> = body.chars().collect();
    for piece in chars.chunks(7) {
        let piece: String = piece.iter().collect();
        seen.extend(acc.feed(&piece).unwrap());
    }
    let (completed, last) = acc.finish().unwrap();

    // Each frame is released by the delimiter of the next one; the stop
    // frame is the buffered remainder and carries no text.
    assert_eq!(
        seen,
        vec!["Two ".to_string(), "pump ".to_string(), "failures.".to_string()]
    );
    assert_eq!(last, None);
    assert_eq!(completed, "Two pump failures.");
    assert!(acc.stopped());
}

#[test]
fn final_frame_delta_is_returned_by_finish() {
    let mut acc = StreamAccumulator::new();
    assert_eq!(acc.feed(&frame("Only")).unwrap(), Vec::<String>::new());

    let (completed, last) = acc.finish().unwrap();
    assert_eq!(completed, "Only");
    assert_eq!(last, Some("Only".to_string()));
}

#[test]
fn stop_frame_content_is_ignored() {
    let mut acc = StreamAccumulator::new();
    acc.feed(&frame("Done")).unwrap();
    acc.feed(&stop_frame()).unwrap();
    acc.feed("data: [DONE]\n\n").unwrap();

    let (completed, _) = acc.finish().unwrap();
    assert_eq!(completed, "Done");
}

#[test]
fn stream_without_text_is_an_empty_reply() {
    let mut acc = StreamAccumulator::new();
    acc.feed(&stop_frame()).unwrap();
    acc.feed("data: [DONE]").unwrap();

    let err = acc.finish().unwrap_err();
    assert_eq!(err.kind, FailureKind::EmptyReply);
    assert_eq!(err.message, EMPTY_REPLY_MESSAGE);
}

#[test]
fn body_without_frames_is_reported_as_server_error() {
    let mut acc = StreamAccumulator::new();
    assert!(acc
        .feed(r#"{"error": {"message": "model not loaded"}}"#)
        .unwrap()
        .is_empty());
    let err = acc.finish().unwrap_err();
    assert_eq!(err.kind, FailureKind::ServerError);
    assert_eq!(err.message, "model not loaded");

    let mut acc = StreamAccumulator::new();
    acc.feed(r#"{"error": 500, "message": "boom"}"#).unwrap();
    assert_eq!(acc.finish().unwrap_err().message, "boom");

    let mut acc = StreamAccumulator::new();
    acc.feed("<html>bad gateway</html>").unwrap();
    assert_eq!(acc.finish().unwrap_err().kind, FailureKind::MalformedFrame);
}

#[test]
fn truncated_final_frame_is_dropped() {
    let mut acc = StreamAccumulator::new();
    acc.feed(&frame("kept")).unwrap();
    acc.feed("data: {\"choices\":[{\"delta\":{\"cont").unwrap();

    let (completed, last) = acc.finish().unwrap();
    assert_eq!(completed, "kept");
    assert_eq!(last, None);
}

#[test]
fn malformed_frame_mid_stream_fails() {
    let mut acc = StreamAccumulator::new();
    let err = acc
        .feed("data: not json\n\ndata: {\"choices\":[]}")
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::MalformedFrame);
}
