//! Canonical byte stream for any `Serialize` value
//!
//! The stream is a typed, Rust-like rendering of the value:
//! `Name{field:u32(1),field:str("x"),}`, `map{str("a"):bool(true),}`,
//! `[i64(1),i64(2),]`, `Enum::Variant(...)`. Map entries are rendered
//! separately and sorted by their key bytes before being written.

use serde::ser::{self, Serialize};
use std::fmt::Display;
use thiserror::Error;

/// Nesting depth past which values are replaced by a fixed marker
///
/// Guarantees termination for `Serialize` impls that recurse without bound,
/// such as graphs with shared or cyclic pointers.
pub const MAX_DEPTH: usize = 64;

const DEPTH_MARKER: &str = "<depth-limit>";

#[derive(Debug, Error)]
#[error("{0}")]
pub(crate) struct CanonicalError(String);

impl ser::Error for CanonicalError {
    fn custom<T: Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

/// Render the canonical bytes of a value
///
/// A serialization failure inside the value is written into the stream as an
/// error marker rather than returned, so every input has some stable output.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    let result = value.serialize(Canonical {
        out: &mut out,
        depth: 0,
    });
    if let Err(err) = result {
        out.extend_from_slice(format!("<error:{}>", err).as_bytes());
    }
    out
}

struct Canonical<'a> {
    out: &'a mut Vec<u8>,
    depth: usize,
}

impl<'a> Canonical<'a> {
    fn write(&mut self, s: &str) {
        self.out.extend_from_slice(s.as_bytes());
    }

    fn scalar(mut self, ty: &str, value: impl Display) -> Result<(), CanonicalError> {
        self.write(&format!("{}({})", ty, value));
        Ok(())
    }

    /// Write `open`, the inner value one level deeper, then `close`
    fn wrap<T: Serialize + ?Sized>(
        mut self,
        open: &str,
        value: &T,
        close: &str,
    ) -> Result<(), CanonicalError> {
        if self.depth >= MAX_DEPTH {
            self.write(DEPTH_MARKER);
            return Ok(());
        }
        self.write(open);
        value.serialize(Canonical {
            out: &mut *self.out,
            depth: self.depth + 1,
        })?;
        self.write(close);
        Ok(())
    }

    fn compound(mut self, open: &str, close: &'static str) -> Compound<'a> {
        let truncated = self.depth >= MAX_DEPTH;
        self.write(if truncated { DEPTH_MARKER } else { open });
        Compound {
            out: self.out,
            depth: self.depth + 1,
            truncated,
            close,
            entries: Vec::new(),
            pending_key: None,
        }
    }
}

struct Compound<'a> {
    out: &'a mut Vec<u8>,
    depth: usize,
    truncated: bool,
    close: &'static str,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pending_key: Option<Vec<u8>>,
}

impl Compound<'_> {
    fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CanonicalError> {
        let mut buf = Vec::new();
        value.serialize(Canonical {
            out: &mut buf,
            depth: self.depth,
        })?;
        Ok(buf)
    }

    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonicalError> {
        if self.truncated {
            return Ok(());
        }
        value.serialize(Canonical {
            out: &mut *self.out,
            depth: self.depth,
        })?;
        self.out.push(b',');
        Ok(())
    }

    fn field<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), CanonicalError> {
        if self.truncated {
            return Ok(());
        }
        self.out.extend_from_slice(name.as_bytes());
        self.out.push(b':');
        self.element(value)
    }

    fn finish(mut self) -> Result<(), CanonicalError> {
        if self.truncated {
            return Ok(());
        }
        let mut entries = std::mem::take(&mut self.entries);
        entries.sort();
        for (key, value) in entries {
            self.out.extend_from_slice(&key);
            self.out.push(b':');
            self.out.extend_from_slice(&value);
            self.out.push(b',');
        }
        self.out.extend_from_slice(self.close.as_bytes());
        Ok(())
    }
}

impl<'a> ser::Serializer for Canonical<'a> {
    type Ok = ();
    type Error = CanonicalError;
    type SerializeSeq = Compound<'a>;
    type SerializeTuple = Compound<'a>;
    type SerializeTupleStruct = Compound<'a>;
    type SerializeTupleVariant = Compound<'a>;
    type SerializeMap = Compound<'a>;
    type SerializeStruct = Compound<'a>;
    type SerializeStructVariant = Compound<'a>;

    fn serialize_bool(self, v: bool) -> Result<(), CanonicalError> {
        self.scalar("bool", v)
    }

    fn serialize_i8(self, v: i8) -> Result<(), CanonicalError> {
        self.scalar("i8", v)
    }

    fn serialize_i16(self, v: i16) -> Result<(), CanonicalError> {
        self.scalar("i16", v)
    }

    fn serialize_i32(self, v: i32) -> Result<(), CanonicalError> {
        self.scalar("i32", v)
    }

    fn serialize_i64(self, v: i64) -> Result<(), CanonicalError> {
        self.scalar("i64", v)
    }

    fn serialize_i128(self, v: i128) -> Result<(), CanonicalError> {
        self.scalar("i128", v)
    }

    fn serialize_u8(self, v: u8) -> Result<(), CanonicalError> {
        self.scalar("u8", v)
    }

    fn serialize_u16(self, v: u16) -> Result<(), CanonicalError> {
        self.scalar("u16", v)
    }

    fn serialize_u32(self, v: u32) -> Result<(), CanonicalError> {
        self.scalar("u32", v)
    }

    fn serialize_u64(self, v: u64) -> Result<(), CanonicalError> {
        self.scalar("u64", v)
    }

    fn serialize_u128(self, v: u128) -> Result<(), CanonicalError> {
        self.scalar("u128", v)
    }

    // Bit patterns, so -0.0 and 0.0 (and distinct NaNs) stay distinct
    fn serialize_f32(self, v: f32) -> Result<(), CanonicalError> {
        self.scalar("f32", format_args!("{:#010x}", v.to_bits()))
    }

    fn serialize_f64(self, v: f64) -> Result<(), CanonicalError> {
        self.scalar("f64", format_args!("{:#018x}", v.to_bits()))
    }

    fn serialize_char(self, v: char) -> Result<(), CanonicalError> {
        self.scalar("char", format_args!("{:?}", v))
    }

    fn serialize_str(self, v: &str) -> Result<(), CanonicalError> {
        self.scalar("str", format_args!("{:?}", v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), CanonicalError> {
        let hex: String = v.iter().map(|b| format!("{:02x}", b)).collect();
        self.scalar("bytes", hex)
    }

    fn serialize_none(mut self) -> Result<(), CanonicalError> {
        self.write("None");
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), CanonicalError> {
        self.wrap("Some(", value, ")")
    }

    fn serialize_unit(mut self) -> Result<(), CanonicalError> {
        self.write("()");
        Ok(())
    }

    fn serialize_unit_struct(mut self, name: &'static str) -> Result<(), CanonicalError> {
        self.write(name);
        Ok(())
    }

    fn serialize_unit_variant(
        mut self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), CanonicalError> {
        self.write(&format!("{}::{}", name, variant));
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<(), CanonicalError> {
        self.wrap(&format!("{}(", name), value, ")")
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), CanonicalError> {
        self.wrap(&format!("{}::{}(", name, variant), value, ")")
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Compound<'a>, CanonicalError> {
        Ok(self.compound("[", "]"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Compound<'a>, CanonicalError> {
        Ok(self.compound("(", ")"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, CanonicalError> {
        Ok(self.compound(&format!("{}(", name), ")"))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, CanonicalError> {
        Ok(self.compound(&format!("{}::{}(", name, variant), ")"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Compound<'a>, CanonicalError> {
        Ok(self.compound("map{", "}"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, CanonicalError> {
        Ok(self.compound(&format!("{}{{", name), "}"))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, CanonicalError> {
        Ok(self.compound(&format!("{}::{}{{", name, variant), "}"))
    }
}

impl ser::SerializeSeq for Compound<'_> {
    type Ok = ();
    type Error = CanonicalError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonicalError> {
        self.element(value)
    }

    fn end(self) -> Result<(), CanonicalError> {
        self.finish()
    }
}

impl ser::SerializeTuple for Compound<'_> {
    type Ok = ();
    type Error = CanonicalError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonicalError> {
        self.element(value)
    }

    fn end(self) -> Result<(), CanonicalError> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for Compound<'_> {
    type Ok = ();
    type Error = CanonicalError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonicalError> {
        self.element(value)
    }

    fn end(self) -> Result<(), CanonicalError> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for Compound<'_> {
    type Ok = ();
    type Error = CanonicalError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonicalError> {
        self.element(value)
    }

    fn end(self) -> Result<(), CanonicalError> {
        self.finish()
    }
}

impl ser::SerializeMap for Compound<'_> {
    type Ok = ();
    type Error = CanonicalError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), CanonicalError> {
        if self.truncated {
            return Ok(());
        }
        self.pending_key = Some(self.render(key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonicalError> {
        if self.truncated {
            return Ok(());
        }
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| CanonicalError("map value without a key".to_string()))?;
        let value = self.render(value)?;
        self.entries.push((key, value));
        Ok(())
    }

    fn end(self) -> Result<(), CanonicalError> {
        self.finish()
    }
}

impl ser::SerializeStruct for Compound<'_> {
    type Ok = ();
    type Error = CanonicalError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CanonicalError> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), CanonicalError> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for Compound<'_> {
    type Ok = ();
    type Error = CanonicalError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CanonicalError> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), CanonicalError> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::HashMap;

    fn text<T: Serialize + ?Sized>(value: &T) -> String {
        String::from_utf8(canonical_bytes(value)).unwrap()
    }

    #[derive(Serialize)]
    struct Rule {
        id: String,
        enabled: bool,
        tags: Vec<&'static str>,
    }

    #[derive(Serialize)]
    enum Scope {
        Cluster,
        Namespace(String),
        Selector { key: String, value: String },
    }

    #[test]
    fn test_struct_rendering() {
        let rule = Rule {
            id: "KSV001".to_string(),
            enabled: true,
            tags: vec!["pod"],
        };
        assert_eq!(
            text(&rule),
            r#"Rule{id:str("KSV001"),enabled:bool(true),tags:[str("pod"),],}"#
        );
    }

    #[test]
    fn test_enum_rendering() {
        assert_eq!(text(&Scope::Cluster), "Scope::Cluster");
        assert_eq!(
            text(&Scope::Namespace("default".to_string())),
            r#"Scope::Namespace(str("default"))"#
        );
        assert_eq!(
            text(&Scope::Selector {
                key: "app".to_string(),
                value: "web".to_string()
            }),
            r#"Scope::Selector{key:str("app"),value:str("web"),}"#
        );
    }

    #[test]
    fn test_map_entries_sorted() {
        let mut map = HashMap::new();
        map.insert("zeta", 1u8);
        map.insert("alpha", 2u8);
        map.insert("mid", 3u8);
        assert_eq!(
            text(&map),
            r#"map{str("alpha"):u8(2),str("mid"):u8(3),str("zeta"):u8(1),}"#
        );
    }

    #[test]
    fn test_json_values_render_deterministically() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b":[1,2.5],"a":null}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a":null,"b":[1,2.5]}"#).unwrap();
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn test_float_sign_is_preserved() {
        assert_ne!(canonical_bytes(&0.0f64), canonical_bytes(&-0.0f64));
    }

    /// A value whose serialization never bottoms out
    struct Endless;

    impl Serialize for Endless {
        fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use ser::SerializeSeq;
            let mut seq = serializer.serialize_seq(Some(1))?;
            seq.serialize_element(self)?;
            seq.end()
        }
    }

    /// Same, through newtype wrapping only
    struct EndlessNewtype;

    impl Serialize for EndlessNewtype {
        fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_newtype_struct("EndlessNewtype", self)
        }
    }

    #[test]
    fn test_unbounded_recursion_terminates() {
        let rendered = text(&Endless);
        assert!(rendered.starts_with("[["));
        assert!(rendered.contains(DEPTH_MARKER));
        assert_eq!(rendered, text(&Endless));

        let rendered = text(&EndlessNewtype);
        assert!(rendered.ends_with(&format!("{})", DEPTH_MARKER)));
    }

    struct Refuses;

    impl Serialize for Refuses {
        fn serialize<S: ser::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(ser::Error::custom("not serializable"))
        }
    }

    #[test]
    fn test_serialization_errors_become_markers() {
        assert_eq!(text(&Refuses), "<error:not serializable>");
        assert_eq!(text(&vec![Refuses]), "[<error:not serializable>");
    }
}
