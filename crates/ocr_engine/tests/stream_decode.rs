use std::convert::Infallible;

use futures_util::{stream, StreamExt};
use ocr_engine::{decode_events, decode_line, EventDecoder, StreamEvent, TextAccumulator};
use pretty_assertions::assert_eq;

const WELL_FORMED: &str = concat!(
    ": OPENROUTER PROCESSING\n",
    "\n",
    "data: {\"choices\":[{\"delta\":{\"reasoning\":\"Reading the receipt\"}}]}\n",
    "\n",
    "data: {\"type\":\"response.reasoning.delta\",\"delta\":\" … done\"}\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"<|begin_of_box|>Café \"}}]}\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"total: 12€\"}}]}\r\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"<|end_of_box|>\"}}]}\n",
    "data: [DONE]\n",
);

fn accumulate(events: impl IntoIterator<Item = StreamEvent>) -> TextAccumulator {
    let mut text = TextAccumulator::default();
    for event in events {
        text.apply(&event);
    }
    text
}

fn decode_in_chunks(input: &[u8], boundaries: &[usize]) -> Vec<StreamEvent> {
    let mut decoder = EventDecoder::default();
    let mut events = Vec::new();
    let mut start = 0;
    for &end in boundaries {
        events.extend(decoder.push(&input[start..end]));
        start = end;
    }
    events.extend(decoder.push(&input[start..]));
    events.extend(decoder.finish());
    events
}

#[test]
fn final_text_is_independent_of_chunk_boundaries() {
    let input = WELL_FORMED.as_bytes();
    let reference = accumulate(decode_in_chunks(input, &[])).finish();
    assert_eq!(reference.text, "Café total: 12€");
    assert_eq!(reference.reasoning, "Reading the receipt … done");

    // Every single split point, including ones inside multibyte characters.
    for split in 0..=input.len() {
        let events = decode_in_chunks(input, &[split]);
        assert_eq!(accumulate(events).finish(), reference, "split at {split}");
    }

    // Byte-by-byte delivery.
    let every_byte: Vec<usize> = (1..input.len()).collect();
    let events = decode_in_chunks(input, &every_byte);
    assert_eq!(accumulate(events).finish(), reference);
}

#[test]
fn done_and_blank_lines_contribute_nothing() {
    assert_eq!(decode_line(""), Vec::<StreamEvent>::new());
    assert_eq!(decode_line("   "), Vec::<StreamEvent>::new());
    assert_eq!(decode_line("data: [DONE]"), vec![StreamEvent::Done]);
    assert_eq!(decode_line("data:[DONE]"), vec![StreamEvent::Done]);

    let text = accumulate(decode_in_chunks(b"\n\ndata: [DONE]\n\n", &[])).finish();
    assert_eq!(text.text, "");
    assert_eq!(text.reasoning, "");
}

#[test]
fn lines_without_prefix_are_ignored() {
    assert!(decode_line(": keep-alive").is_empty());
    assert!(decode_line("event: message").is_empty());
    assert!(decode_line(r#"{"choices":[{"delta":{"content":"x"}}]}"#).is_empty());
}

#[test]
fn malformed_payload_is_reported_and_skipped() {
    let input = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n",
        "data: {\"choices\":[{\"delta\":\n",
        "data: 42\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n",
    );
    let events = decode_in_chunks(input.as_bytes(), &[]);

    let parse_errors = events
        .iter()
        .filter(|event| matches!(event, StreamEvent::ParseError { .. }))
        .count();
    assert_eq!(parse_errors, 2);
    assert_eq!(accumulate(events).finish().text, "AB");
}

#[test]
fn tagged_reasoning_shape_is_dispatched_first() {
    // A tagged payload never falls through to the choices shape.
    let line = r#"data: {"type":"response.reasoning.delta","delta":"think","choices":[{"delta":{"content":"nope"}}]}"#;
    assert_eq!(
        decode_line(line),
        vec![StreamEvent::ReasoningDelta("think".to_string())]
    );

    let other_type = r#"data: {"type":"response.output_text.delta","choices":[{"delta":{"content":"yes"}}]}"#;
    assert_eq!(
        decode_line(other_type),
        vec![StreamEvent::ContentDelta("yes".to_string())]
    );
}

#[test]
fn choices_shape_yields_reasoning_before_content() {
    let line = r#"data: {"choices":[{"delta":{"content":"out","reasoning":"why"}}]}"#;
    assert_eq!(
        decode_line(line),
        vec![
            StreamEvent::ReasoningDelta("why".to_string()),
            StreamEvent::ContentDelta("out".to_string()),
        ]
    );

    let empty = r#"data: {"choices":[{"delta":{"role":"assistant","content":"","reasoning":null}}]}"#;
    assert!(decode_line(empty).is_empty());
}

#[test]
fn upstream_error_payload_is_surfaced() {
    let line = r#"data: {"error":{"message":"Provider returned error","code":502}}"#;
    assert_eq!(
        decode_line(line),
        vec![StreamEvent::UpstreamError(
            "Provider returned error".to_string()
        )]
    );
}

#[test]
fn box_markers_are_stripped_only_on_final_delivery() {
    let mut text = TextAccumulator::default();
    text.apply(&StreamEvent::ContentDelta("<|begin_of_box|>HELLO".to_string()));
    text.apply(&StreamEvent::ContentDelta("<|end_of_box|>".to_string()));
    assert_eq!(text.output(), "<|begin_of_box|>HELLO<|end_of_box|>");
    assert_eq!(text.finish().text, "HELLO");

    let plain = accumulate([StreamEvent::ContentDelta("HELLO".to_string())]);
    assert_eq!(plain.finish().text, "HELLO");
}

#[test]
fn unterminated_last_line_is_flushed() {
    let events = decode_in_chunks(
        br#"data: {"choices":[{"delta":{"content":"tail"}}]}"#,
        &[],
    );
    assert_eq!(events, vec![StreamEvent::ContentDelta("tail".to_string())]);
}

#[tokio::test]
async fn decode_events_is_lazy_and_stops_at_done() {
    let chunks: Vec<Result<&[u8], Infallible>> = vec![
        Ok(&b"data: {\"choices\":[{\"delta\":{\"con"[..]),
        Ok(&b"tent\":\"one\"}}]}\ndata: [DONE]\n"[..]),
        Ok(&b"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n"[..]),
    ];
    let events: Vec<_> = decode_events(stream::iter(chunks))
        .map(|item| item.expect("infallible"))
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::ContentDelta("one".to_string()),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn decode_events_passes_transport_errors_through() {
    let chunks: Vec<Result<&[u8], &str>> = vec![
        Ok(&b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n"[..]),
        Err("reset"),
        Ok(&b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n"[..]),
    ];
    let events: Vec<_> = decode_events(stream::iter(chunks)).collect().await;

    assert_eq!(
        events,
        vec![Ok(StreamEvent::ContentDelta("a".to_string())), Err("reset")]
    );
}
