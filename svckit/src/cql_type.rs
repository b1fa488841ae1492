//! CQL column types as a closed set of variants.
//!
//! Driver metadata reports column types as text (`map<text, frozen<list<int>>>`).
//! [`ColumnType::parse`] turns that text into a tree the literal encoder can
//! dispatch on, and `Display` renders it back for `CREATE TABLE`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Ascii,
    Text,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Varint,
    Counter,
    Float,
    Double,
    Decimal,
    Boolean,
    Timestamp,
    Date,
    Time,
    Uuid,
    Timeuuid,
    Inet,
    Blob,
    Duration,
}

/// How values of a scalar type are written as CQL literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralClass {
    /// Single-quoted with embedded quotes doubled.
    Text,
    /// Bare decimal digits.
    Numeric,
    Boolean,
    /// `'YYYY-MM-DD HH:MM:SS'`, and no literal at all for an unset value.
    Timestamp,
    Date,
    Time,
    Uuid,
    /// `0x`-prefixed hex.
    Blob,
    /// Types whose values cannot be carried over as literals.
    Unsupported,
}

impl ScalarType {
    pub fn from_name(name: &str) -> Option<Self> {
        let scalar = match name.trim().to_ascii_lowercase().as_str() {
            "ascii" => ScalarType::Ascii,
            "text" | "varchar" => ScalarType::Text,
            "tinyint" => ScalarType::TinyInt,
            "smallint" => ScalarType::SmallInt,
            "int" => ScalarType::Int,
            "bigint" => ScalarType::BigInt,
            "varint" => ScalarType::Varint,
            "counter" => ScalarType::Counter,
            "float" => ScalarType::Float,
            "double" => ScalarType::Double,
            "decimal" => ScalarType::Decimal,
            "boolean" => ScalarType::Boolean,
            "timestamp" => ScalarType::Timestamp,
            "date" => ScalarType::Date,
            "time" => ScalarType::Time,
            "uuid" => ScalarType::Uuid,
            "timeuuid" => ScalarType::Timeuuid,
            "inet" => ScalarType::Inet,
            "blob" => ScalarType::Blob,
            "duration" => ScalarType::Duration,
            _ => return None,
        };
        Some(scalar)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Ascii => "ascii",
            ScalarType::Text => "text",
            ScalarType::TinyInt => "tinyint",
            ScalarType::SmallInt => "smallint",
            ScalarType::Int => "int",
            ScalarType::BigInt => "bigint",
            ScalarType::Varint => "varint",
            ScalarType::Counter => "counter",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::Decimal => "decimal",
            ScalarType::Boolean => "boolean",
            ScalarType::Timestamp => "timestamp",
            ScalarType::Date => "date",
            ScalarType::Time => "time",
            ScalarType::Uuid => "uuid",
            ScalarType::Timeuuid => "timeuuid",
            ScalarType::Inet => "inet",
            ScalarType::Blob => "blob",
            ScalarType::Duration => "duration",
        }
    }

    pub fn literal_class(&self) -> LiteralClass {
        match self {
            ScalarType::Ascii | ScalarType::Text | ScalarType::Inet => LiteralClass::Text,
            ScalarType::TinyInt
            | ScalarType::SmallInt
            | ScalarType::Int
            | ScalarType::BigInt
            | ScalarType::Counter
            | ScalarType::Float
            | ScalarType::Double => LiteralClass::Numeric,
            ScalarType::Boolean => LiteralClass::Boolean,
            ScalarType::Timestamp => LiteralClass::Timestamp,
            ScalarType::Date => LiteralClass::Date,
            ScalarType::Time => LiteralClass::Time,
            ScalarType::Uuid | ScalarType::Timeuuid => LiteralClass::Uuid,
            ScalarType::Blob => LiteralClass::Blob,
            ScalarType::Varint | ScalarType::Decimal | ScalarType::Duration => {
                LiteralClass::Unsupported
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Scalar(ScalarType),
    List(Box<ColumnType>),
    Set(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Frozen(Box<ColumnType>),
    /// User-defined types, tuples, vectors and anything else not modelled above.
    /// Kept verbatim so the DDL still round-trips.
    Custom(String),
}

impl ColumnType {
    pub fn parse(text: &str) -> ColumnType {
        let trimmed = text.trim();

        let Some((name, args)) = split_generic(trimmed) else {
            return ScalarType::from_name(trimmed)
                .map(ColumnType::Scalar)
                .unwrap_or_else(|| ColumnType::Custom(trimmed.to_string()));
        };

        let args = split_top_level(args);
        match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("frozen", [inner]) => ColumnType::Frozen(Box::new(ColumnType::parse(inner))),
            ("list", [elem]) => ColumnType::List(Box::new(ColumnType::parse(elem))),
            ("set", [elem]) => ColumnType::Set(Box::new(ColumnType::parse(elem))),
            ("map", [key, value]) => ColumnType::Map(
                Box::new(ColumnType::parse(key)),
                Box::new(ColumnType::parse(value)),
            ),
            _ => ColumnType::Custom(trimmed.to_string()),
        }
    }

    pub fn list(elem: ColumnType) -> Self {
        ColumnType::List(Box::new(elem))
    }

    pub fn set(elem: ColumnType) -> Self {
        ColumnType::Set(Box::new(elem))
    }

    pub fn map(key: ColumnType, value: ColumnType) -> Self {
        ColumnType::Map(Box::new(key), Box::new(value))
    }

    /// The type with every outer `frozen<>` removed. Freezing only matters for DDL.
    pub fn unfrozen(&self) -> &ColumnType {
        let mut current = self;
        while let ColumnType::Frozen(inner) = current {
            current = inner;
        }
        current
    }
}

impl From<ScalarType> for ColumnType {
    fn from(scalar: ScalarType) -> Self {
        ColumnType::Scalar(scalar)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Scalar(scalar) => f.write_str(scalar.name()),
            ColumnType::List(elem) => write!(f, "list<{}>", elem),
            ColumnType::Set(elem) => write!(f, "set<{}>", elem),
            ColumnType::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            ColumnType::Frozen(inner) => write!(f, "frozen<{}>", inner),
            ColumnType::Custom(text) => f.write_str(text),
        }
    }
}

/// `list<int>` -> `("list", "int")`.
fn split_generic(text: &str) -> Option<(&str, &str)> {
    let open = text.find('<')?;
    let args = text[open + 1..].strip_suffix('>')?;
    Some((text[..open].trim(), args))
}

/// Split on commas that are not nested inside `<...>`.
fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(args[start..].trim());
    parts
}
