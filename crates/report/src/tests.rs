use super::*;
use anyhow::Result;
use filter::{Record, RecordHandler};
use rdb::{
    ChecksumStatus, ConsumerGroup, Encoding, ModuleId, ObjectType, Stream, StreamEntry, StreamId,
    Value,
};

fn record(db: u64, key: &str, size: u64, value: Value) -> Record {
    let kind = match &value {
        Value::String(_) => ObjectType::String,
        Value::List(_) => ObjectType::List,
        Value::Set(_) => ObjectType::Set,
        Value::Hash(_) => ObjectType::Hash,
        Value::SortedSet(_) => ObjectType::SortedSet,
        Value::Stream(_) => ObjectType::Stream,
        Value::Opaque { .. } => ObjectType::Module,
    };
    Record {
        db: Some(db),
        key: Some(key.as_bytes().to_vec()),
        expire_at_ms: None,
        size: Some(size),
        kind: Some(kind),
        encoding: Some(Encoding::Raw),
        value: Some(value),
    }
}

fn string(db: u64, key: &str, value: &str) -> Record {
    record(db, key, 10, Value::String(value.as_bytes().to_vec()))
}

fn sized(key: &str, size: u64) -> Record {
    Record {
        value: None,
        ..record(0, key, size, Value::String(Vec::new()))
    }
}

fn bytes(items: &[&str]) -> Vec<Vec<u8>> {
    items.iter().map(|s| s.as_bytes().to_vec()).collect()
}

fn resp(args: &[&str]) -> String {
    let mut out = format!("*{}\r\n", args.len());
    for a in args {
        out.push_str(&format!("${}\r\n{}\r\n", a.len(), a));
    }
    out
}

fn lines(out: Vec<u8>) -> Vec<String> {
    String::from_utf8_lossy(&out)
        .lines()
        .map(str::to_string)
        .collect()
}

// -------------------- helpers --------------------

#[test]
fn readable_size_units() {
    assert_eq!(readable_size(0), "0B");
    assert_eq!(readable_size(1023), "1023B");
    assert_eq!(readable_size(1024), "1.0K");
    assert_eq!(readable_size(1536), "1.5K");
    assert_eq!(readable_size(20 * 1024 * 1024), "20.0M");
}

#[test]
fn csv_cell_quotes_only_when_needed() {
    assert_eq!(csv_cell("plain"), "plain");
    assert_eq!(csv_cell("a,b"), "\"a,b\"");
    assert_eq!(csv_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
}

// -------------------- JSON --------------------

#[test]
fn json_empty_input_is_empty_array() -> Result<()> {
    let mut json = JsonExporter::new(Vec::new());
    json.on_end(ChecksumStatus::Skipped)?;
    assert_eq!(json.into_inner(), b"[]\n");
    Ok(())
}

#[test]
fn json_abort_closes_the_array_once() -> Result<()> {
    let mut json = JsonExporter::new(Vec::new());
    json.on_record(string(0, "a", "1"))?;
    json.on_abort()?;
    json.on_abort()?;
    let out = String::from_utf8(json.into_inner())?;
    let parsed: serde_json::Value = serde_json::from_str(&out)?;
    assert_eq!(parsed.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn json_writes_one_object_per_record() -> Result<()> {
    let mut json = JsonExporter::new(Vec::new());
    json.on_record(string(0, "foo", "bar"))?;
    let mut list = record(1, "q", 30, Value::List(bytes(&["a", "b"])));
    list.expire_at_ms = Some(1_700_000_000_000);
    json.on_record(list)?;
    json.on_end(ChecksumStatus::Valid)?;
    assert_eq!(json.written(), 2);

    let doc: serde_json::Value = serde_json::from_slice(&json.into_inner())?;
    let items = doc.as_array().map(Vec::as_slice).unwrap_or_default();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["key"], "foo");
    assert_eq!(items[0]["type"], "string");
    assert_eq!(items[0]["value"], "bar");
    assert!(items[0].get("expiration").is_none());
    assert_eq!(items[1]["db"], 1);
    assert_eq!(items[1]["expiration"], 1_700_000_000_000i64);
    assert_eq!(items[1]["values"], serde_json::json!(["a", "b"]));
    Ok(())
}

#[test]
fn json_value_field_is_named_per_type() -> Result<()> {
    let mut json = JsonExporter::new(Vec::new());
    json.on_record(record(0, "s", 1, Value::Set(bytes(&["x"]))))?;
    json.on_record(record(
        0,
        "h",
        1,
        Value::Hash(vec![(b"b".to_vec(), b"2".to_vec()), (b"a".to_vec(), b"1".to_vec())]),
    ))?;
    json.on_record(record(
        0,
        "z",
        1,
        Value::SortedSet(vec![(b"m".to_vec(), 1.5), (b"n".to_vec(), f64::INFINITY)]),
    ))?;
    json.on_end(ChecksumStatus::Valid)?;

    let text = String::from_utf8(json.into_inner())?;
    // Hash fields keep stored order.
    assert!(text.contains(r#""hash":{"b":"2","a":"1"}"#), "{}", text);
    let doc: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(doc[0]["members"], serde_json::json!(["x"]));
    assert_eq!(doc[2]["entries"][0]["score"], 1.5);
    assert_eq!(doc[2]["entries"][1]["score"], "inf");
    Ok(())
}

#[test]
fn json_stream_has_entries_and_groups() -> Result<()> {
    let id = StreamId { ms: 5, seq: 1 };
    let stream = Stream {
        entries: vec![StreamEntry {
            id,
            fields: vec![(b"f".to_vec(), b"v".to_vec())],
        }],
        length: 1,
        last_id: id,
        groups: vec![ConsumerGroup {
            name: b"g".to_vec(),
            last_id: id,
            entries_read: Some(1),
            pending: Vec::new(),
            consumers: Vec::new(),
        }],
        ..Stream::default()
    };
    let mut json = JsonExporter::new(Vec::new());
    json.on_record(record(0, "st", 50, Value::Stream(Box::new(stream))))?;
    json.on_end(ChecksumStatus::Valid)?;

    let doc: serde_json::Value = serde_json::from_slice(&json.into_inner())?;
    assert_eq!(doc[0]["entries"][0]["id"], "5-1");
    assert_eq!(doc[0]["entries"][0]["fields"]["f"], "v");
    assert_eq!(doc[0]["groups"][0]["name"], "g");
    assert_eq!(doc[0]["groups"][0]["entries_read"], 1);
    Ok(())
}

#[test]
fn json_honours_projection() -> Result<()> {
    let projected = Record {
        db: None,
        key: Some(b"k".to_vec()),
        expire_at_ms: None,
        size: Some(7),
        kind: None,
        encoding: None,
        value: None,
    };
    let mut json = JsonExporter::new(Vec::new());
    json.on_record(projected)?;
    json.on_end(ChecksumStatus::Valid)?;
    let doc: serde_json::Value = serde_json::from_slice(&json.into_inner())?;
    assert_eq!(doc, serde_json::json!([{"key": "k", "size": 7}]));
    Ok(())
}

// -------------------- SSV --------------------

#[test]
fn ssv_default_fields() -> Result<()> {
    let mut ssv = SsvExporter::new(Vec::new(), None);
    ssv.on_record(string(0, "foo", "bar"))?;
    ssv.on_record(record(2, "q", 30, Value::List(bytes(&["a"]))))?;
    assert_eq!(lines(ssv.into_inner()), vec!["0 foo string 10", "2 q list 30"]);
    Ok(())
}

#[test]
fn ssv_projected_fields_and_absent_cells() -> Result<()> {
    use config::Field;
    let fields = vec![Field::Key, Field::Expiration, Field::Value];
    let mut ssv = SsvExporter::new(Vec::new(), Some(fields));
    ssv.on_record(string(0, "foo", "bar"))?;
    ssv.on_record(record(0, "s", 1, Value::Set(bytes(&["x", "y"]))))?;
    assert_eq!(
        lines(ssv.into_inner()),
        vec!["foo - bar", r#"s - ["x","y"]"#]
    );
    Ok(())
}

#[test]
fn ssv_custom_separator() -> Result<()> {
    let mut ssv = SsvExporter::new(Vec::new(), None).with_separator("\t");
    ssv.on_record(string(0, "foo", "bar"))?;
    assert_eq!(lines(ssv.into_inner()), vec!["0\tfoo\tstring\t10"]);
    Ok(())
}

// -------------------- AOF --------------------

#[test]
fn aof_string_with_select_and_expiry() -> Result<()> {
    let mut aof = AofWriter::new(Vec::new());
    let mut rec = string(0, "foo", "bar");
    rec.expire_at_ms = Some(1_700_000_000_000);
    aof.on_record(rec)?;
    aof.on_end(ChecksumStatus::Valid)?;
    let expected = [
        resp(&["SELECT", "0"]),
        resp(&["SET", "foo", "bar"]),
        resp(&["PEXPIREAT", "foo", "1700000000000"]),
    ]
    .concat();
    assert_eq!(aof.commands(), 3);
    assert_eq!(String::from_utf8(aof.into_inner())?, expected);
    Ok(())
}

#[test]
fn aof_selects_only_on_db_change() -> Result<()> {
    let mut aof = AofWriter::new(Vec::new());
    aof.on_record(string(0, "a", "1"))?;
    aof.on_record(string(0, "b", "2"))?;
    aof.on_record(string(3, "c", "3"))?;
    let expected = [
        resp(&["SELECT", "0"]),
        resp(&["SET", "a", "1"]),
        resp(&["SET", "b", "2"]),
        resp(&["SELECT", "3"]),
        resp(&["SET", "c", "3"]),
    ]
    .concat();
    assert_eq!(String::from_utf8(aof.into_inner())?, expected);
    Ok(())
}

#[test]
fn aof_batches_large_collections() -> Result<()> {
    let mut aof = AofWriter::new(Vec::new()).with_batch(2);
    aof.on_record(record(0, "l", 1, Value::List(bytes(&["a", "b", "c"]))))?;
    let expected = [
        resp(&["SELECT", "0"]),
        resp(&["RPUSH", "l", "a", "b"]),
        resp(&["RPUSH", "l", "c"]),
    ]
    .concat();
    assert_eq!(String::from_utf8(aof.into_inner())?, expected);
    Ok(())
}

#[test]
fn aof_hash_and_zset_argument_order() -> Result<()> {
    let mut aof = AofWriter::new(Vec::new());
    aof.on_record(record(
        0,
        "h",
        1,
        Value::Hash(vec![(b"f".to_vec(), b"v".to_vec())]),
    ))?;
    aof.on_record(record(
        0,
        "z",
        1,
        Value::SortedSet(vec![(b"m".to_vec(), 2.5), (b"n".to_vec(), f64::NEG_INFINITY)]),
    ))?;
    let expected = [
        resp(&["SELECT", "0"]),
        resp(&["HSET", "h", "f", "v"]),
        resp(&["ZADD", "z", "2.5", "m", "-inf", "n"]),
    ]
    .concat();
    assert_eq!(String::from_utf8(aof.into_inner())?, expected);
    Ok(())
}

#[test]
fn aof_stream_entries_and_groups() -> Result<()> {
    let id = StreamId { ms: 10, seq: 0 };
    let stream = Stream {
        entries: vec![StreamEntry {
            id,
            fields: vec![(b"f".to_vec(), b"v".to_vec())],
        }],
        length: 1,
        last_id: StreamId { ms: 12, seq: 0 },
        groups: vec![ConsumerGroup {
            name: b"g".to_vec(),
            last_id: id,
            entries_read: Some(1),
            pending: Vec::new(),
            consumers: Vec::new(),
        }],
        ..Stream::default()
    };
    let mut aof = AofWriter::new(Vec::new());
    aof.on_record(record(0, "st", 1, Value::Stream(Box::new(stream))))?;
    let expected = [
        resp(&["SELECT", "0"]),
        resp(&["XADD", "st", "10-0", "f", "v"]),
        resp(&["XSETID", "st", "12-0"]),
        resp(&["XGROUP", "CREATE", "st", "g", "10-0", "ENTRIESREAD", "1"]),
    ]
    .concat();
    assert_eq!(String::from_utf8(aof.into_inner())?, expected);
    Ok(())
}

#[test]
fn aof_skips_module_values_and_valueless_records() -> Result<()> {
    let mut aof = AofWriter::new(Vec::new());
    let module = Value::Opaque {
        module: ModuleId {
            name: "ReJSON-RL".to_string(),
            version: 3,
        },
        raw: vec![1, 2, 3],
    };
    aof.on_record(record(0, "m", 1, module))?;
    aof.on_record(sized("k", 1))?;
    assert_eq!(aof.skipped(), 2);
    // The module record still switched the database.
    assert_eq!(String::from_utf8(aof.into_inner())?, resp(&["SELECT", "0"]));
    Ok(())
}

// -------------------- memory --------------------

#[test]
fn memory_report_rows() -> Result<()> {
    let mut report = MemoryReport::new(Vec::new());
    report.on_record(record(0, "q", 2048, Value::List(bytes(&["a", "b", "c"]))))?;
    report.on_record(sized("a,b", 10))?;
    report.on_end(ChecksumStatus::Valid)?;
    assert_eq!(report.total_bytes(), 2058);
    assert_eq!(
        lines(report.into_inner()),
        vec![
            "database,key,type,size,size_readable,element_count",
            "0,q,list,2048,2.0K,3",
            "0,\"a,b\",string,10,10B,",
        ]
    );
    Ok(())
}

#[test]
fn memory_report_header_without_records() -> Result<()> {
    let mut report = MemoryReport::new(Vec::new());
    report.on_end(ChecksumStatus::Skipped)?;
    assert_eq!(lines(report.into_inner()), vec![memory::HEADER]);
    Ok(())
}

#[test]
fn memory_report_header_written_on_abort() -> Result<()> {
    let mut report = MemoryReport::new(Vec::new());
    report.on_abort()?;
    assert_eq!(lines(report.into_inner()), vec![memory::HEADER]);
    Ok(())
}

// -------------------- bigkey --------------------

#[test]
fn top_n_keeps_largest_in_descending_order() {
    let mut top = TopN::new(2);
    for (i, size) in [10u64, 50, 5, 80, 20].iter().enumerate() {
        top.push(sized(&format!("k{}", i), *size));
    }
    let ranked: Vec<u64> = top.into_sorted().iter().map(|r| r.size).collect();
    assert_eq!(ranked, vec![80, 50]);
}

#[test]
fn top_n_zero_keeps_nothing() {
    let mut top = TopN::new(0);
    top.push(sized("a", 100));
    assert!(top.is_empty());
    assert!(top.into_sorted().is_empty());
}

#[test]
fn top_n_ties_favour_earlier_keys() {
    let mut top = TopN::new(2);
    top.push(sized("first", 10));
    top.push(sized("second", 10));
    top.push(sized("third", 10));
    let keys: Vec<String> = top
        .into_sorted()
        .iter()
        .map(|r| r.record.key_lossy())
        .collect();
    assert_eq!(keys, vec!["first", "second"]);
}

#[test]
fn top_n_writes_memory_layout_csv() -> Result<()> {
    let mut top = TopN::new(5);
    top.on_record(sized("small", 10))?;
    top.on_record(sized("big", 4096))?;
    assert_eq!(top.len(), 2);
    let mut out = Vec::new();
    top.write_csv(&mut out)?;
    assert_eq!(
        lines(out),
        vec![
            "database,key,type,size,size_readable,element_count",
            "0,big,string,4096,4.0K,",
            "0,small,string,10,10B,",
        ]
    );
    Ok(())
}

// -------------------- flame graph --------------------

#[test]
fn flame_tree_sums_sizes_along_paths() {
    let mut tree = FlameTree::default();
    tree.add("a:b:c", 10);
    tree.add("a:b:d", 5);
    tree.add("x", 2);
    assert_eq!(tree.root().value, 17);
    assert_eq!(tree.node(&["a"]).map(|n| n.value), Some(15));
    assert_eq!(tree.node(&["a", "b"]).map(|n| n.value), Some(15));
    assert_eq!(tree.node(&["a", "b", "c"]).map(|n| n.value), Some(10));
    assert_eq!(tree.node(&["x"]).map(|n| n.value), Some(2));
    assert!(tree.node(&["a", "c"]).is_none());
    assert_eq!(tree.keys(), 3);
}

#[test]
fn flame_tree_splits_on_any_separator() {
    let tree = FlameTree::new(vec![":".to_string(), "::".to_string(), ".".to_string()]);
    assert_eq!(tree.split("a::b.c:d"), vec!["a", "b", "c", "d"]);
    assert_eq!(tree.split("plain"), vec!["plain"]);
    assert_eq!(tree.split(":lead"), vec!["", "lead"]);
}

#[test]
fn flame_tree_empty_separators_fall_back_to_colon() {
    let tree = FlameTree::new(vec![String::new()]);
    assert_eq!(tree.separators(), &[":".to_string()]);
}

#[test]
fn flame_tree_json_shape() -> Result<()> {
    let mut tree = FlameTree::default();
    tree.on_record(sized("a:b", 4))?;
    let doc: serde_json::Value = serde_json::from_str(&tree.to_json()?)?;
    assert_eq!(
        doc,
        serde_json::json!({
            "name": "root",
            "value": 4,
            "children": [
                {"name": "a", "value": 4, "children": [
                    {"name": "b", "value": 4, "children": []}
                ]}
            ]
        })
    );
    Ok(())
}

// -------------------- server --------------------

async fn http_get(addr: std::net::SocketAddr, request: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut stream = tokio::net::TcpStream::connect(addr).await?;
    stream.write_all(request.as_bytes()).await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

#[tokio::test]
async fn flame_server_serves_page_and_json() -> Result<()> {
    let server = FlameServer::bind(0).await?;
    let port = server.local_addr()?.port();
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let json = r#"{"name":"root","value":1,"children":[]}"#.to_string();
    let task = tokio::spawn(server.serve(json.clone()));

    let page = http_get(addr, "GET / HTTP/1.1\r\nHost: x\r\n\r\n").await?;
    assert!(page.starts_with("HTTP/1.1 200 OK"), "{}", page);
    assert!(page.contains("flamegraph.json"));
    assert!(page.contains(r##"d3.select("#chart")"##));

    let data = http_get(addr, "GET /flamegraph.json HTTP/1.1\r\n\r\n").await?;
    assert!(data.starts_with("HTTP/1.1 200 OK"));
    assert!(data.contains("application/json"));
    assert!(data.ends_with(&json));

    let missing = http_get(addr, "GET /nope HTTP/1.1\r\n\r\n").await?;
    assert!(missing.starts_with("HTTP/1.1 404"));

    let post = http_get(addr, "POST / HTTP/1.1\r\n\r\n").await?;
    assert!(post.starts_with("HTTP/1.1 405"));

    task.abort();
    Ok(())
}
