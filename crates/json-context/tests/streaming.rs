mod common;

use common::{context, push_verified};
use json_context::{JsonContext, Message, PushOptions, StreamError, StreamOptions};
use serde_json::json;

fn pages() -> JsonContext {
    context(json!({
        "matchers": [{"collection": "pages", "item": "pages[id={.id}]", "match": {"type": "page"}}],
        "historyLimit": 16
    }))
}

fn decode(line: &str) -> serde_json::Value {
    serde_json::from_str(line).unwrap()
}

#[test]
fn accepted_changes_are_emitted() {
    let mut ctx = pages();
    let mut stream = ctx.change_stream(StreamOptions::default());

    let page = json!({"id": 1, "type": "page", "title": "Fancy Page", "$local": true});
    ctx.push_change(page.into(), PushOptions::verified().at(42));

    let line = stream.read_line().unwrap();
    assert!(line.ends_with('\n'));
    assert_eq!(
        decode(&line),
        json!({"object": {"id": 1, "type": "page", "title": "Fancy Page"}, "time": 42})
    );
    assert!(stream.read_line().is_none());
}

#[test]
fn no_feedback_to_originating_stream() {
    let mut ctx = pages();
    let mut stream1 = ctx.change_stream(StreamOptions::verified());
    let mut stream2 = ctx.change_stream(StreamOptions::verified());

    let page1 = json!({"id": 1, "type": "page", "title": "Fancy Page"});
    let page2 = json!({"id": 2, "type": "page", "title": "Another Fancy Page"});

    let line1 = format!("{}\n", json!({"object": page1}));
    let line2 = format!("{}\n", json!({"object": page2}));
    assert_eq!(stream1.write(&mut ctx, line1.as_bytes()).unwrap(), 1);
    assert_eq!(stream2.write(&mut ctx, line2.as_bytes()).unwrap(), 1);

    assert_eq!(decode(&stream1.read_all())["object"], page2);
    assert_eq!(decode(&stream2.read_all())["object"], page1);
    assert_eq!(*ctx.data(), json!({"pages": [page1, page2]}));
}

#[test]
fn partial_lines_are_buffered() {
    let mut ctx = pages();
    let mut stream = ctx.change_stream(StreamOptions::verified());
    let line = format!("{}\n", json!({"object": {"id": 1, "type": "page"}, "time": 10}));
    let (head, tail) = line.as_bytes().split_at(12);

    assert_eq!(stream.write(&mut ctx, head).unwrap(), 0);
    assert_eq!(*ctx.data(), json!({}));
    assert_eq!(stream.write(&mut ctx, tail).unwrap(), 1);
    assert_eq!(*ctx.data(), json!({"pages": [{"id": 1, "type": "page"}]}));
    assert_eq!(stream.time(), Some(10));
}

#[test]
fn stream_tracks_latest_time() {
    let mut ctx = pages();
    let mut stream = ctx.change_stream(StreamOptions::verified());
    let input = [
        json!({"object": {"id": 1, "type": "page"}, "time": 30}),
        json!({"object": {"id": 2, "type": "page"}, "time": 20}),
    ]
    .iter()
    .map(|m| format!("{m}\n"))
    .collect::<String>();
    stream.write(&mut ctx, input.as_bytes()).unwrap();
    assert_eq!(stream.time(), Some(30));
}

#[test]
fn undecodable_lines_are_skipped() {
    let mut ctx = pages();
    let mut stream = ctx.change_stream(StreamOptions::verified());
    let input = "not json\n\n{\"object\": {\"id\": 1, \"type\": \"page\"}}\n";
    assert_eq!(stream.write(&mut ctx, input.as_bytes()).unwrap(), 1);
    assert_eq!(*ctx.data(), json!({"pages": [{"id": 1, "type": "page"}]}));
}

#[test]
fn unverified_stream_is_subject_to_rules() {
    let mut ctx = context(json!({
        "matchers": [{"collection": "pages", "item": "pages[id={.id}]", "allow": {"append": false}}]
    }));
    let mut stream = ctx.change_stream(StreamOptions::default());
    stream.write(&mut ctx, b"{\"object\": {\"id\": 1}}\n").unwrap();
    assert_eq!(*ctx.data(), json!({}));
}

#[test]
fn since_backfills_from_history() {
    let mut ctx = pages();
    for (id, time) in [(1, 100), (2, 200), (3, 300)] {
        ctx.push_change(json!({"id": id, "type": "page"}).into(), PushOptions::verified().at(time));
    }
    let mut stream = ctx.change_stream(StreamOptions::verified());
    stream.write(&mut ctx, b"{\"since\": 150}\n").unwrap();

    let lines: Vec<serde_json::Value> = stream.read_all().lines().map(decode).collect();
    assert_eq!(
        lines,
        [
            json!({"object": {"id": 2, "type": "page"}, "time": 200}),
            json!({"object": {"id": 3, "type": "page"}, "time": 300})
        ]
    );
}

#[test]
fn backfill_skips_changes_from_the_requesting_stream() {
    let mut ctx = pages();
    let mut stream = ctx.change_stream(StreamOptions::verified());
    stream
        .write(&mut ctx, b"{\"object\": {\"id\": 1, \"type\": \"page\"}, \"time\": 5}\n")
        .unwrap();
    push_verified(&mut ctx, json!({"id": 2, "type": "page"}));
    stream.read_all();

    stream.write(&mut ctx, b"{\"since\": 0}\n").unwrap();
    let lines: Vec<serde_json::Value> = stream.read_all().lines().map(decode).collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["object"]["id"], json!(2));
}

#[test]
fn requests_are_queued_for_the_peer() {
    let mut ctx = pages();
    let mut stream = ctx.change_stream(StreamOptions::default());
    stream.request_changes_since(1234).unwrap();
    stream.request_snapshot().unwrap();
    assert_eq!(stream.pending(), 2);
    assert_eq!(stream.read_line().unwrap(), "{\"since\":1234}\n");
    assert_eq!(stream.read_line().unwrap(), "{\"get\":\"all\"}\n");
}

#[test]
fn snapshot_exchange_between_replicas() {
    let mut server = context(json!({
        "data": {"pages": [{"id": 1, "type": "page", "$draft": true}]},
        "matchers": [{"collection": "pages", "item": "pages[id={.id}]", "match": {"type": "page"}}]
    }));
    let mut client = pages();
    let mut server_end = server.change_stream(StreamOptions::verified());
    let mut client_end = client.change_stream(StreamOptions::verified());

    client_end.request_snapshot().unwrap();
    let request = client_end.read_all();
    server_end.write(&mut server, request.as_bytes()).unwrap();
    let reply = server_end.read_all();
    client_end.write(&mut client, reply.as_bytes()).unwrap();

    let snapshot = client_end.take_snapshot().unwrap();
    assert_eq!(snapshot["data"], json!({"pages": [{"id": 1, "type": "page"}]}));
    assert_eq!(snapshot["matchers"][0]["item"], json!("pages[id={.id}]"));
    assert!(client_end.take_snapshot().is_none());
}

#[test]
fn replicas_converge_through_piped_streams() {
    let mut left = pages();
    let mut right = pages();
    let mut left_end = left.change_stream(StreamOptions::verified());
    let mut right_end = right.change_stream(StreamOptions::verified());

    push_verified(&mut left, json!({"id": 1, "type": "page", "title": "a"}));
    push_verified(&mut left, json!({"id": 2, "type": "page", "title": "b"}));
    let batch = left_end.read_all();
    right_end.write(&mut right, batch.as_bytes()).unwrap();
    assert_eq!(right.data().to_json(), left.data().to_json());
    // Changes received from a peer are not sent back to it.
    assert_eq!(right_end.pending(), 0);

    push_verified(&mut left, json!({"id": 2, "type": "page", "_deleted": true}));
    let batch = left_end.read_all();
    right_end.write(&mut right, batch.as_bytes()).unwrap();

    push_verified(&mut right, json!({"id": 1, "type": "page", "title": "edited"}));
    let batch = right_end.read_all();
    left_end.write(&mut left, batch.as_bytes()).unwrap();

    let expected = json!({"pages": [{"id": 1, "type": "page", "title": "edited"}]});
    assert_eq!(*left.data(), expected);
    assert_eq!(*right.data(), expected);
    assert_eq!(left_end.pending(), 0);
    assert_eq!(right_end.pending(), 0);
}

#[test]
fn closed_stream_stops_listening() {
    let mut ctx = pages();
    let mut stream = ctx.change_stream(StreamOptions::verified());
    stream.close(&mut ctx);
    assert!(stream.is_closed());

    push_verified(&mut ctx, json!({"id": 1, "type": "page"}));
    assert_eq!(stream.pending(), 0);
    assert!(matches!(
        stream.write(&mut ctx, b"{\"since\": 0}\n"),
        Err(StreamError::Closed)
    ));
}

#[test]
fn message_encoding_matches_wire_format() {
    let line = Message::Since { since: 9 }.encode().unwrap();
    assert_eq!(line, "{\"since\":9}\n");
}

#[test]
fn changes_without_an_object_are_ignored() {
    let mut ctx = context(json!({
        "data": {"items": []},
        "matchers": [{"item": "items[id={.id}]", "collection": "items"}]
    }));
    let mut stream = ctx.change_stream(StreamOptions::verified());

    let handled = stream
        .write(&mut ctx, b"{\"object\": null}\n{\"object\": 5, \"time\": 3}\n")
        .unwrap();
    assert_eq!(handled, 2);
    assert_eq!(*ctx.data(), json!({"items": []}));
    assert_eq!(stream.time(), None);
}

#[test]
fn oversized_lines_are_dropped() {
    let mut ctx = pages();
    let mut stream = ctx.change_stream(StreamOptions::verified().with_max_line_bytes(16));

    assert_eq!(stream.write(&mut ctx, b"{\"object\": {\"id\": 1,").unwrap(), 0);
    assert_eq!(stream.write(&mut ctx, b" \"type\": \"page\"}}\n").unwrap(), 0);
    let page = b"{\"object\": {\"id\": 2, \"type\": \"page\"}}\n";
    assert_eq!(stream.write(&mut ctx, page).unwrap(), 1);

    assert_eq!(*ctx.data(), json!({"pages": [{"id": 2, "type": "page"}]}));
}
