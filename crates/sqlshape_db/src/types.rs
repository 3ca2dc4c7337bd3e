//! Metadata types shared by the catalog querier, the introspector and the cache.
//!
//! These types are also the on-disk cache format, so their serialized form
//! is part of the public contract.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::MetadataError;

// ============================================================================
// SqlType
// ============================================================================

/// Canonical SQL Server data type.
///
/// Built from engine-reported type names such as `nvarchar(50)` or
/// `decimal(18,2)`. Length, precision and scale are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    Numeric,
    Money,
    SmallMoney,
    Float,
    Real,
    Date,
    Time,
    DateTime,
    DateTime2,
    SmallDateTime,
    DateTimeOffset,
    Char,
    VarChar,
    Text,
    NChar,
    NVarChar,
    NText,
    Binary,
    VarBinary,
    Image,
    UniqueIdentifier,
    Xml,
    /// `timestamp` / `rowversion`
    RowVersion,
    SqlVariant,
    Geography,
    Geometry,
    HierarchyId,
    /// User alias types and anything the engine reports that is not listed above.
    Other(AliasType),
}

/// Name of a type outside the built-in list.
///
/// Only built by [`SqlType::from_type_name`] (lowercased) or when loading a
/// cache file (kept verbatim), so it never spells a built-in type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AliasType(String);

impl AliasType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const BUILTIN_TYPES: &[SqlType] = &[
    SqlType::Bit,
    SqlType::TinyInt,
    SqlType::SmallInt,
    SqlType::Int,
    SqlType::BigInt,
    SqlType::Decimal,
    SqlType::Numeric,
    SqlType::Money,
    SqlType::SmallMoney,
    SqlType::Float,
    SqlType::Real,
    SqlType::Date,
    SqlType::Time,
    SqlType::DateTime,
    SqlType::DateTime2,
    SqlType::SmallDateTime,
    SqlType::DateTimeOffset,
    SqlType::Char,
    SqlType::VarChar,
    SqlType::Text,
    SqlType::NChar,
    SqlType::NVarChar,
    SqlType::NText,
    SqlType::Binary,
    SqlType::VarBinary,
    SqlType::Image,
    SqlType::UniqueIdentifier,
    SqlType::Xml,
    SqlType::RowVersion,
    SqlType::SqlVariant,
    SqlType::Geography,
    SqlType::Geometry,
    SqlType::HierarchyId,
];

impl SqlType {
    /// Map an engine-reported type name to its canonical type.
    ///
    /// Case-insensitive; any `(...)` suffix is ignored. `sysname` is the
    /// engine's internal name-holding type and maps to `nvarchar`.
    /// Names that are not built-in types become a lowercase [`SqlType::Other`].
    pub fn from_type_name(raw: &str) -> Self {
        let base = raw
            .split('(')
            .next()
            .unwrap_or(raw)
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();

        let canonical = match base.as_str() {
            "sysname" => "nvarchar",
            "timestamp" => "rowversion",
            other => other,
        };
        if let Some(builtin) = Self::builtin(canonical) {
            return builtin;
        }

        // Keep something recognisable when stripping leaves nothing, e.g. "(x)".
        let name = if base.is_empty() {
            raw.trim().to_ascii_lowercase()
        } else {
            base
        };
        SqlType::Other(AliasType(name))
    }

    /// Built-in type whose canonical name is exactly `name`.
    fn builtin(name: &str) -> Option<Self> {
        BUILTIN_TYPES.iter().find(|t| t.as_str() == name).cloned()
    }

    /// Canonical lowercase name, as written to the cache.
    pub fn as_str(&self) -> &str {
        match self {
            SqlType::Bit => "bit",
            SqlType::TinyInt => "tinyint",
            SqlType::SmallInt => "smallint",
            SqlType::Int => "int",
            SqlType::BigInt => "bigint",
            SqlType::Decimal => "decimal",
            SqlType::Numeric => "numeric",
            SqlType::Money => "money",
            SqlType::SmallMoney => "smallmoney",
            SqlType::Float => "float",
            SqlType::Real => "real",
            SqlType::Date => "date",
            SqlType::Time => "time",
            SqlType::DateTime => "datetime",
            SqlType::DateTime2 => "datetime2",
            SqlType::SmallDateTime => "smalldatetime",
            SqlType::DateTimeOffset => "datetimeoffset",
            SqlType::Char => "char",
            SqlType::VarChar => "varchar",
            SqlType::Text => "text",
            SqlType::NChar => "nchar",
            SqlType::NVarChar => "nvarchar",
            SqlType::NText => "ntext",
            SqlType::Binary => "binary",
            SqlType::VarBinary => "varbinary",
            SqlType::Image => "image",
            SqlType::UniqueIdentifier => "uniqueidentifier",
            SqlType::Xml => "xml",
            SqlType::RowVersion => "rowversion",
            SqlType::SqlVariant => "sql_variant",
            SqlType::Geography => "geography",
            SqlType::Geometry => "geometry",
            SqlType::HierarchyId => "hierarchyid",
            SqlType::Other(alias) => alias.as_str(),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SqlType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Exact inverse of `Serialize`: built-in names map back to their variant,
/// anything else is kept verbatim as [`SqlType::Other`].
impl<'de> Deserialize<'de> for SqlType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = <String as Deserialize>::deserialize(deserializer)?;
        Ok(SqlType::builtin(&raw).unwrap_or(SqlType::Other(AliasType(raw))))
    }
}

// ============================================================================
// FieldDescriptor / ResultSet
// ============================================================================

/// One column of a result set or table type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    pub is_nullable: bool,
    pub db_type: SqlType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, is_nullable: bool, db_type: SqlType) -> Self {
        Self {
            name: name.into(),
            is_nullable,
            db_type,
        }
    }
}

/// Ordered fields of a result set or table type.
///
/// Order follows the engine's column order. Empty is a valid value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<FieldDescriptor>);

impl ResultSet {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self(fields)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.0
    }

    pub fn into_fields(self) -> Vec<FieldDescriptor> {
        self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.0.iter()
    }

    /// First name that appears more than once, compared case-insensitively.
    pub fn first_duplicate_name(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.0
            .iter()
            .map(|f| f.name.as_str())
            .find(|name| !seen.insert(name.to_lowercase()))
    }
}

impl From<Vec<FieldDescriptor>> for ResultSet {
    fn from(fields: Vec<FieldDescriptor>) -> Self {
        Self(fields)
    }
}

impl FromIterator<FieldDescriptor> for ResultSet {
    fn from_iter<I: IntoIterator<Item = FieldDescriptor>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ResultSet {
    type Item = FieldDescriptor;
    type IntoIter = std::vec::IntoIter<FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// ObjectName
// ============================================================================

/// Schema used when a name is given without one.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Two-part `schema.name` identifier of a procedure or table type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectName {
    pub schema: String,
    pub name: String,
}

impl ObjectName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `name`, `schema.name`, `[schema].[name]` or `"schema"."name"`.
    pub fn parse(input: &str) -> Result<Self, MetadataError> {
        let parts = split_identifier(input)?;
        match parts.as_slice() {
            [name] => Ok(Self::new(DEFAULT_SCHEMA, name.clone())),
            [schema, name] => Ok(Self::new(schema.clone(), name.clone())),
            _ => Err(MetadataError::invalid_name(
                input,
                format!("expected one or two parts, found {}", parts.len()),
            )),
        }
    }

    /// Bracket-quoted T-SQL form, e.g. `[dbo].[GetUsers]`.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_part(&self.schema), quote_part(&self.name))
    }

    /// File-system safe stem used for the cache entry.
    ///
    /// Every byte outside `[A-Za-z0-9_-]` is percent-escaped within each
    /// part, so distinct names never share a file.
    pub fn cache_file_stem(&self) -> String {
        format!("{}.{}", escape_part(&self.schema), escape_part(&self.name))
    }

    /// Inverse of [`ObjectName::cache_file_stem`].
    pub fn from_cache_file_stem(stem: &str) -> Option<Self> {
        let (schema, name) = stem.split_once('.')?;
        if name.contains('.') {
            return None;
        }
        Some(Self::new(unescape_part(schema)?, unescape_part(name)?))
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl FromStr for ObjectName {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn quote_part(part: &str) -> String {
    format!("[{}]", part.replace(']', "]]"))
}

fn escape_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn unescape_part(part: &str) -> Option<String> {
    let bytes = part.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = part.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn split_identifier(input: &str) -> Result<Vec<String>, MetadataError> {
    let mut parts = Vec::new();
    let mut chars = input.trim().chars().peekable();

    loop {
        let mut part = String::new();
        match chars.peek() {
            Some('[') | Some('"') => {
                let close = if chars.next() == Some('[') { ']' } else { '"' };
                loop {
                    match chars.next() {
                        Some(c) if c == close => {
                            // A doubled closing delimiter is a literal.
                            if chars.peek() == Some(&close) {
                                chars.next();
                                part.push(close);
                            } else {
                                break;
                            }
                        }
                        Some(c) => part.push(c),
                        None => {
                            return Err(MetadataError::invalid_name(
                                input,
                                format!("unterminated quoted identifier, expected '{}'", close),
                            ))
                        }
                    }
                }
            }
            _ => {
                while let Some(&c) = chars.peek() {
                    if c == '.' {
                        break;
                    }
                    part.push(c);
                    chars.next();
                }
                part = part.trim().to_string();
            }
        }

        if part.is_empty() {
            return Err(MetadataError::invalid_name(input, "empty identifier part"));
        }
        parts.push(part);

        match chars.next() {
            None => break,
            Some('.') => continue,
            Some(c) => {
                return Err(MetadataError::invalid_name(
                    input,
                    format!("unexpected character '{}' after quoted identifier", c),
                ))
            }
        }
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysname_maps_to_nvarchar() {
        assert_eq!(SqlType::from_type_name("sysname"), SqlType::NVarChar);
        assert_eq!(SqlType::from_type_name("SYSNAME"), SqlType::NVarChar);
    }

    #[test]
    fn test_type_name_suffixes_are_ignored() {
        assert_eq!(SqlType::from_type_name("nvarchar(50)"), SqlType::NVarChar);
        assert_eq!(SqlType::from_type_name("nvarchar(max)"), SqlType::NVarChar);
        assert_eq!(SqlType::from_type_name("decimal(18,2)"), SqlType::Decimal);
        assert_eq!(SqlType::from_type_name(" INT "), SqlType::Int);
        assert_eq!(SqlType::from_type_name("timestamp"), SqlType::RowVersion);
    }

    #[test]
    fn test_unknown_types_keep_lowercase_name() {
        let t = SqlType::from_type_name("PhoneNumber");
        assert!(matches!(t, SqlType::Other(_)));
        assert_eq!(t.as_str(), "phonenumber");
        assert_eq!(SqlType::from_type_name(t.as_str()), t);
    }

    #[test]
    fn test_type_name_that_strips_to_nothing_keeps_raw_text() {
        let t = SqlType::from_type_name("(X)");
        assert_eq!(t.as_str(), "(x)");
    }

    #[test]
    fn test_field_serialization_shape() {
        let field = FieldDescriptor::new("Email", true, SqlType::NVarChar);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Email", "isNullable": true, "dbType": "nvarchar"})
        );
    }

    #[test]
    fn test_type_names_deserialize_exactly() {
        let load = |name: &str| serde_json::from_value::<SqlType>(serde_json::json!(name)).unwrap();

        assert_eq!(load("int"), SqlType::Int);
        assert_eq!(load("rowversion"), SqlType::RowVersion);
        // Not canonical spellings, so kept as written.
        assert_eq!(load("PhoneNumber").as_str(), "PhoneNumber");
        assert_eq!(load("INT").as_str(), "INT");
        assert_eq!(load("").as_str(), "");

        for t in [
            SqlType::Decimal,
            SqlType::from_type_name("dbo.PhoneNumber"),
            SqlType::from_type_name("(x)"),
            load("MixedCase"),
        ] {
            let json = serde_json::to_value(&t).unwrap();
            assert_eq!(serde_json::from_value::<SqlType>(json).unwrap(), t);
        }
    }

    #[test]
    fn test_first_duplicate_name() {
        let set = ResultSet::new(vec![
            FieldDescriptor::new("Id", false, SqlType::Int),
            FieldDescriptor::new("Name", true, SqlType::NVarChar),
            FieldDescriptor::new("id", true, SqlType::BigInt),
        ]);
        assert_eq!(set.first_duplicate_name(), Some("id"));
        assert_eq!(ResultSet::empty().first_duplicate_name(), None);
    }

    #[test]
    fn test_parse_object_names() {
        assert_eq!(
            ObjectName::parse("dbo.GetUsers").unwrap(),
            ObjectName::new("dbo", "GetUsers")
        );
        assert_eq!(
            ObjectName::parse("GetUsers").unwrap(),
            ObjectName::new("dbo", "GetUsers")
        );
        assert_eq!(
            ObjectName::parse("[sales].[Get.Orders]").unwrap(),
            ObjectName::new("sales", "Get.Orders")
        );
        assert_eq!(
            ObjectName::parse("\"api\".\"Odd\"\"Name\"").unwrap(),
            ObjectName::new("api", "Odd\"Name")
        );
        assert_eq!(
            ObjectName::parse("[a]]b].c").unwrap(),
            ObjectName::new("a]b", "c")
        );
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        for bad in ["", "db.dbo.Proc", "dbo.", "[dbo", "[dbo]x.y"] {
            let err = ObjectName::parse(bad).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::InvalidName, "input: {bad:?}");
        }
    }

    #[test]
    fn test_quoted_escapes_brackets() {
        let name = ObjectName::new("dbo", "We]ird");
        assert_eq!(name.quoted(), "[dbo].[We]]ird]");
        assert_eq!(ObjectName::parse(&name.quoted()).unwrap(), name);
    }

    #[test]
    fn test_cache_file_stem_is_escaped_and_injective() {
        let plain = ObjectName::new("dbo", "GetUsers");
        assert_eq!(plain.cache_file_stem(), "dbo.GetUsers");

        let a = ObjectName::new("a.b", "c");
        let b = ObjectName::new("a", "b.c");
        assert_ne!(a.cache_file_stem(), b.cache_file_stem());
        assert_eq!(a.cache_file_stem(), "a%2Eb.c");

        let odd = ObjectName::new("dbo", "Kunden/Übersicht");
        let stem = odd.cache_file_stem();
        assert!(!stem.contains('/'));
        assert_eq!(ObjectName::from_cache_file_stem(&stem), Some(odd));
    }

    #[test]
    fn test_cache_file_stem_rejects_non_hex_escapes() {
        assert_eq!(
            ObjectName::from_cache_file_stem("dbo.%41x"),
            Some(ObjectName::new("dbo", "Ax"))
        );
        for bad in ["dbo.%+1x", "dbo.%-1x", "dbo.%4", "dbo.% 1x"] {
            assert_eq!(ObjectName::from_cache_file_stem(bad), None, "stem: {bad:?}");
        }
    }
}
