use std::path::Path;

use serde_json::json;
use stash_core::{impl_object, CodecError, Codec, Context, Document, EnvConfig, Envelope, Payload, Registry, Value};

#[derive(Debug, Clone, PartialEq)]
struct Blob(Vec<u8>);
impl_object!(Blob);

#[derive(Debug, Clone, PartialEq)]
struct Pair(Value, Value);
impl_object!(Pair);

#[derive(Debug, Clone, PartialEq)]
struct Opaque;
impl_object!(Opaque);

fn registry() -> Registry {
    let mut reg = Registry::new();
    reg.register_encoder("blob", |v, ctx, _| {
           let Some(blob) = v.downcast_ref::<Blob>() else { return Ok(None) };
           let payload = ctx.artifacts().store(blob.0.clone())?;
           Ok(Some(payload.write_into(Envelope::new("test.blob", 1)).into_document()))
       })
       .register_encoder("pair", |v, ctx, codec| {
           let Some(pair) = v.downcast_ref::<Pair>() else { return Ok(None) };
           let items = codec.encode_list(&[pair.0.clone(), pair.1.clone()], &ctx.with_child("items"))?;
           Ok(Some(Envelope::new("test.pair", 2).with_field("items", items).into_document()))
       })
       .register_decoder("test.blob", 1, |env, ctx, _| {
           ctx.raise_if_nodecode("test.blob")?;
           Ok(Value::object(Blob(Payload::from_envelope(&env)?.load(ctx)?)))
       })
       .register_decoder("test.pair", 2, |env, ctx, codec| {
           let items = env.field("items")?
                          .as_array()
                          .ok_or_else(|| env.malformed("`items` must be an array"))?;
           let mut decoded = codec.decode_list(items, &ctx.with_child("items"))?;
           if decoded.len() != 2 {
               return Err(env.malformed("expected two items"));
           }
           let b = decoded.pop().unwrap_or_default();
           let a = decoded.pop().unwrap_or_default();
           Ok(Value::object(Pair(a, b)))
       });
    reg
}

fn ctx_in(dir: &Path, threshold: usize) -> Context {
    Context::builder().env(EnvConfig::default())
                      .artifact_path(dir)
                      .min_artifact_size(threshold)
                      .build()
                      .unwrap()
}

fn artifact_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn plain_value_round_trips_without_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx_in(dir.path(), 0);
    let codec = Codec::new(registry());
    let value = Value::map([("a", Value::from(vec![1, 2, 3])), ("b", Value::from("x")), ("c", Value::Null)]);

    let text = codec.to_json(&value, &ctx).unwrap();
    assert_eq!(codec.from_json(&text, &ctx).unwrap(), value);
    assert_eq!(artifact_count(dir.path()), 0);
}

#[test]
fn threshold_boundary_is_inclusive() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx_in(dir.path(), 8000);
    let codec = Codec::new(registry());

    let at = codec.encode(&Value::object(Blob(vec![7; 8000])), &ctx).unwrap();
    assert!(at.get("data").is_some() && at.get("id").is_none());
    assert_eq!(artifact_count(dir.path()), 0);

    let over = codec.encode(&Value::object(Blob(vec![7; 8001])), &ctx).unwrap();
    assert!(over.get("id").is_some() && over.get("data").is_none());
    assert_eq!(artifact_count(dir.path()), 1);

    assert_eq!(codec.decode(&over, &ctx).unwrap(), Value::object(Blob(vec![7; 8001])));
}

#[test]
fn nested_objects_recurse_through_the_codec() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx_in(dir.path(), 0);
    let codec = Codec::new(registry());
    let value = Value::object(Pair(Value::object(Blob(b"abc".to_vec())), Value::from(vec![Value::object(Pair(1.into(), 2.into()))])));

    let doc = codec.encode(&value, &ctx).unwrap();
    assert_eq!(doc["__type__"], json!("test.pair"));
    assert_eq!(codec.decode(&doc, &ctx).unwrap(), value);
}

#[test]
fn nodecode_prefix_yields_absent_and_keeps_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Codec::new(registry());
    let ctx = ctx_in(dir.path(), 0);
    let value = Value::map([("blob", Value::object(Blob(vec![1, 2]))), ("n", Value::from(5))]);
    let doc = codec.encode(&value, &ctx).unwrap();

    let skip = Context::builder().env(EnvConfig::default())
                                 .artifact_path(dir.path())
                                 .nodecode_types(["test"])
                                 .build()
                                 .unwrap();
    let decoded = codec.decode(&doc, &skip).unwrap();
    assert!(decoded.get("blob").is_some_and(Value::is_absent));
    assert_eq!(decoded.get("n"), Some(&Value::Int(5)));

    let unrelated = Context::builder().env(EnvConfig::default())
                                      .artifact_path(dir.path())
                                      .nodecode_types(["tes"])
                                      .build()
                                      .unwrap();
    assert_eq!(codec.decode(&doc, &unrelated).unwrap(), value);
}

#[test]
fn unregistered_nodecode_tag_is_still_skipped() {
    let codec = Codec::plain();
    let ctx = Context::builder().env(EnvConfig::default())
                                .artifact_path(".")
                                .nodecode_types(["ext"])
                                .build()
                                .unwrap();
    let doc = json!([{"__type__": "ext.thing", "__version__": 4}, 1]);
    assert_eq!(codec.decode(&doc, &ctx).unwrap(), Value::from(vec![Value::Absent, Value::Int(1)]));
}

#[test]
fn unknown_version_names_tag_and_version() {
    let codec = Codec::new(registry());
    let ctx = ctx_in(Path::new("."), 0);
    let doc = json!({"x": {"__type__": "test.pair", "__version__": 99, "items": []}});
    let err = codec.decode(&doc, &ctx).unwrap_err();
    let msg = err.to_string();
    assert!(matches!(err, CodecError::Deserialization { .. }));
    assert!(msg.contains("test.pair") && msg.contains("99") && msg.contains("$.x"), "{msg}");
}

#[test]
fn unsupported_object_names_type_and_location() {
    let codec = Codec::new(registry());
    let ctx = ctx_in(Path::new("."), 0);
    let err = codec.encode(&Value::map([("k", Value::from(vec![Value::object(Opaque)]))]), &ctx)
                   .unwrap_err();
    assert!(err.is_unsupported());
    let msg = err.to_string();
    assert!(msg.contains("Opaque") && msg.contains("$.k.0"), "{msg}");
}

#[test]
fn missing_artifact_fails_with_io_kind() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Codec::new(registry());
    let ctx = ctx_in(dir.path(), 0);
    let doc = json!({"__type__": "test.blob", "__version__": 1, "id": "does-not-exist"});
    let err = codec.decode(&doc, &ctx).unwrap_err();
    assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
}

#[test]
fn save_and_load_relocate_together() {
    let dir = tempfile::tempdir().unwrap();
    let codec = Codec::new(registry());
    let src = dir.path().join("a");
    std::fs::create_dir_all(&src).unwrap();
    let file = src.join("doc.json");
    let value = Value::from(vec![Value::object(Blob(vec![9; 64])), Value::from(1.5)]);

    let ctx = Context::builder().env(EnvConfig::default())
                                .file_path(&file)
                                .min_artifact_size(0)
                                .build()
                                .unwrap();
    codec.save_json(&value, &file, Some(&ctx)).unwrap();
    assert_eq!(artifact_count(&src), 2);

    let moved = dir.path().join("b");
    std::fs::rename(&src, &moved).unwrap();
    let loaded = codec.load_json(moved.join("doc.json"), None).unwrap();
    assert_eq!(loaded, value);
}

#[test]
fn malformed_envelope_is_fatal() {
    let codec = Codec::plain();
    let ctx = ctx_in(Path::new("."), 0);
    let err = codec.decode(&json!({"a": {"__type__": "x"}}), &ctx).unwrap_err();
    assert!(matches!(err, CodecError::Deserialization { ref path, .. } if path == "$.a"));
    assert_eq!(codec.decode(&Document::from(3.25), &ctx).unwrap(), Value::Float(3.25));
}
