//! Result materialization
//!
//! Typed domain objects declare a table of [`Field`]s, each pairing a
//! member name with a setter that converts the member's value. A member
//! that is absent (or `Null`) leaves the field at its default; a member
//! that is present but cannot be converted fails the whole record.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::record::{RawRecord, Value};

/// A present member whose value does not fit the declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: &'static str,
    pub found: String,
}

impl Mismatch {
    fn new(expected: &'static str, value: &Value) -> Self {
        Self {
            expected,
            found: format!("{} {}", value.kind(), value),
        }
    }
}

/// One entry of a type's field table.
pub struct Field<T> {
    pub name: &'static str,
    pub apply: fn(&mut T, &Value) -> std::result::Result<(), Mismatch>,
}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish()
    }
}

/// Types that can be built from a raw record.
pub trait Materialize: Default + 'static {
    const FIELDS: &'static [Field<Self>];
}

/// Build a `T` from `record` using `T::FIELDS`.
pub fn materialize<T: Materialize>(record: &RawRecord) -> Result<T> {
    let mut out = T::default();
    for field in T::FIELDS {
        let Some(value) = record.get(field.name).filter(|v| !v.is_null()) else {
            continue;
        };
        (field.apply)(&mut out, value).map_err(|m| Error::Materialization {
            field: field.name,
            expected: m.expected,
            found: m.found,
        })?;
    }
    Ok(out)
}

/// Materialize every record, skipping (and logging) the ones that fail.
pub fn materialize_all<'a, T, I>(records: I) -> Vec<T>
where
    T: Materialize,
    I: IntoIterator<Item = &'a RawRecord>,
{
    records
        .into_iter()
        .filter_map(|record| match materialize::<T>(record) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    target_type = std::any::type_name::<T>(),
                    "skipping record that failed materialization"
                );
                None
            }
        })
        .collect()
}

/// Value converters used by field tables.
pub mod convert {
    use super::*;

    type Converted<T> = std::result::Result<T, Mismatch>;

    pub fn string(value: &Value) -> Converted<String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(if *b { "True" } else { "False" }.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::UInt(u) => Ok(u.to_string()),
            Value::Float(x) => Ok(x.to_string()),
            Value::Guid(g) => Ok(g.to_string()),
            Value::Record(_) | Value::List(_) => Err(Mismatch::new("string", value)),
        }
    }

    pub fn i64(value: &Value) -> Converted<i64> {
        match value {
            Value::Null => Ok(0),
            Value::Int(i) => Ok(*i),
            Value::UInt(u) => i64::try_from(*u).map_err(|_| Mismatch::new("signed integer", value)),
            Value::Float(x) if x.fract() == 0.0 && x.abs() < 9.2e18 => Ok(*x as i64),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| Mismatch::new("signed integer", value)),
            _ => Err(Mismatch::new("signed integer", value)),
        }
    }

    pub fn u64(value: &Value) -> Converted<u64> {
        match value {
            Value::Null => Ok(0),
            Value::UInt(u) => Ok(*u),
            Value::Int(i) => {
                u64::try_from(*i).map_err(|_| Mismatch::new("unsigned integer", value))
            }
            Value::Float(x) if x.fract() == 0.0 && *x >= 0.0 && *x < 1.8e19 => Ok(*x as u64),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| Mismatch::new("unsigned integer", value)),
            _ => Err(Mismatch::new("unsigned integer", value)),
        }
    }

    pub fn u32(value: &Value) -> Converted<u32> {
        let wide = u64(value)?;
        u32::try_from(wide).map_err(|_| Mismatch::new("32-bit unsigned integer", value))
    }

    pub fn bool(value: &Value) -> Converted<bool> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Int(0) | Value::UInt(0) => Ok(false),
            Value::Int(1) | Value::UInt(1) => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(Mismatch::new("bool", value)),
        }
    }

    pub fn guid(value: &Value) -> Converted<Uuid> {
        match value {
            Value::Null => Ok(Uuid::nil()),
            Value::Guid(g) => Ok(*g),
            Value::String(s) if s.trim().is_empty() => Ok(Uuid::nil()),
            Value::String(s) => Uuid::parse_str(s.trim()).map_err(|_| Mismatch::new("guid", value)),
            _ => Err(Mismatch::new("guid", value)),
        }
    }

    /// GUID where the nil value means "none".
    pub fn optional_guid(value: &Value) -> Converted<Option<Uuid>> {
        guid(value).map(|g| (!g.is_nil()).then_some(g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Disk {
        path: String,
        size: u64,
        attached: bool,
        owner: Option<Uuid>,
    }

    impl Materialize for Disk {
        const FIELDS: &'static [Field<Self>] = &[
            Field {
                name: "Path",
                apply: |d, v| {
                    d.path = convert::string(v)?;
                    Ok(())
                },
            },
            Field {
                name: "Size",
                apply: |d, v| {
                    d.size = convert::u64(v)?;
                    Ok(())
                },
            },
            Field {
                name: "Attached",
                apply: |d, v| {
                    d.attached = convert::bool(v)?;
                    Ok(())
                },
            },
            Field {
                name: "OwnerId",
                apply: |d, v| {
                    d.owner = convert::optional_guid(v)?;
                    Ok(())
                },
            },
        ];
    }

    #[test]
    fn test_absent_members_use_defaults() {
        let disk: Disk = materialize(&RawRecord::new()).unwrap();
        assert_eq!(disk, Disk::default());
    }

    #[test]
    fn test_null_members_use_defaults() {
        let record = RawRecord::new()
            .with("Path", Value::Null)
            .with("OwnerId", Value::Null);
        let disk: Disk = materialize(&record).unwrap();
        assert_eq!(disk, Disk::default());
    }

    #[test]
    fn test_present_members_convert() {
        let owner = Uuid::new_v4();
        let record = RawRecord::new()
            .with("Path", "C:\\disk.vhdx")
            .with("Size", "1024")
            .with("Attached", "True")
            .with("OwnerId", owner.to_string())
            .with("Unrelated", 7);
        let disk: Disk = materialize(&record).unwrap();
        assert_eq!(disk.path, "C:\\disk.vhdx");
        assert_eq!(disk.size, 1024);
        assert!(disk.attached);
        assert_eq!(disk.owner, Some(owner));
    }

    #[test]
    fn test_unconvertible_member_fails() {
        let record = RawRecord::new().with("Size", "large");
        let err = materialize::<Disk>(&record).unwrap_err();
        match err {
            Error::Materialization {
                field, expected, ..
            } => {
                assert_eq!(field, "Size");
                assert_eq!(expected, "unsigned integer");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_materialize_all_skips_bad_records() {
        let records = vec![
            RawRecord::new().with("Path", "a"),
            RawRecord::new().with("Size", -1),
            RawRecord::new().with("Path", "c"),
        ];
        let disks: Vec<Disk> = materialize_all(&records);
        let paths: Vec<&str> = disks.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "c"]);
    }

    #[test]
    fn test_convert_guid() {
        assert_eq!(convert::guid(&Value::from("")), Ok(Uuid::nil()));
        assert!(convert::guid(&Value::from("not-a-guid")).is_err());
        assert_eq!(
            convert::optional_guid(&Value::from(Uuid::nil().to_string())),
            Ok(None)
        );
    }

    #[test]
    fn test_convert_numbers() {
        assert_eq!(convert::u64(&Value::Int(42)), Ok(42));
        assert!(convert::u64(&Value::Int(-1)).is_err());
        assert_eq!(convert::u64(&Value::Float(2048.0)), Ok(2048));
        assert!(convert::u64(&Value::Float(1.5)).is_err());
        assert_eq!(convert::i64(&Value::from(" -3 ")), Ok(-3));
        assert!(convert::u32(&Value::UInt(u64::from(u32::MAX) + 1)).is_err());
        assert!(convert::i64(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_convert_string_and_bool() {
        assert_eq!(convert::string(&Value::Int(5)), Ok("5".to_string()));
        assert!(convert::string(&Value::List(vec![])).is_err());
        assert_eq!(convert::bool(&Value::Int(1)), Ok(true));
        assert_eq!(convert::bool(&Value::from("FALSE")), Ok(false));
        assert!(convert::bool(&Value::from("maybe")).is_err());
    }
}
