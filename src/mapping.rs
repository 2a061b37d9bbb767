//! Source type tokens to SQL Server column types
//!
//! Mapping never fails. Anything unexpected is logged and replaced by the
//! closest safe rendering, `NVARCHAR(MAX)` for unknown tokens.

use std::fmt;

use tracing::{debug, warn};

use crate::model::ColumnSpec;
use crate::util::is_marker;

pub const DEFAULT_DECIMAL_PRECISION: i64 = 18;
pub const MAX_DECIMAL_PRECISION: i64 = 38;
/// `int` columns declaring more digits than this become `BIGINT`
pub const INT_DIGIT_LIMIT: i64 = 9;

/// Recognized source type tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Int,
    BigInt,
    NVarChar,
    VarChar,
    NChar,
    Char,
    DateTime,
    Decimal,
    Float,
    Bit,
}

impl BaseType {
    pub const ALL: [BaseType; 10] = [
        BaseType::Int,
        BaseType::BigInt,
        BaseType::NVarChar,
        BaseType::VarChar,
        BaseType::NChar,
        BaseType::Char,
        BaseType::DateTime,
        BaseType::Decimal,
        BaseType::Float,
        BaseType::Bit,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|base| base.token().eq_ignore_ascii_case(token))
    }

    pub fn token(self) -> &'static str {
        match self {
            BaseType::Int => "int",
            BaseType::BigInt => "bigint",
            BaseType::NVarChar => "nvarchar",
            BaseType::VarChar => "varchar",
            BaseType::NChar => "nchar",
            BaseType::Char => "char",
            BaseType::DateTime => "datetime",
            BaseType::Decimal => "decimal",
            BaseType::Float => "float",
            BaseType::Bit => "bit",
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            BaseType::Int => "INT",
            BaseType::BigInt => "BIGINT",
            BaseType::NVarChar => "NVARCHAR",
            BaseType::VarChar => "VARCHAR",
            BaseType::NChar => "NCHAR",
            BaseType::Char => "CHAR",
            BaseType::DateTime => "DATETIME",
            BaseType::Decimal => "DECIMAL",
            BaseType::Float => "FLOAT",
            BaseType::Bit => "BIT",
        }
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            BaseType::NVarChar | BaseType::VarChar | BaseType::NChar | BaseType::Char
        )
    }

    /// Largest explicit length SQL Server accepts for a string type
    fn max_length(self) -> Option<i64> {
        match self {
            BaseType::NVarChar | BaseType::NChar => Some(4000),
            BaseType::VarChar | BaseType::Char => Some(8000),
            _ => None,
        }
    }
}

/// Length argument of a string type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringLength {
    Max,
    Chars(i64),
}

impl fmt::Display for StringLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringLength::Max => write!(f, "MAX"),
            StringLength::Chars(n) => write!(f, "{}", n),
        }
    }
}

/// A rendered SQL column type without nullability or default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Plain(BaseType),
    String(BaseType, StringLength),
    Decimal { precision: i64, scale: i64 },
}

impl SqlType {
    pub fn is_string(&self) -> bool {
        matches!(self, SqlType::String(..))
    }

    pub fn base(&self) -> BaseType {
        match self {
            SqlType::Plain(base) | SqlType::String(base, _) => *base,
            SqlType::Decimal { .. } => BaseType::Decimal,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Plain(base) => write!(f, "{}", base.keyword()),
            SqlType::String(base, length) => write!(f, "{}({})", base.keyword(), length),
            SqlType::Decimal { precision, scale } => {
                write!(f, "DECIMAL({},{})", precision, scale)
            }
        }
    }
}

/// Resolve the SQL type of a column, returning it with every substitution
/// made along the way
fn resolve(column: &ColumnSpec) -> (SqlType, Vec<String>) {
    let mut warnings = Vec::new();

    let Some(base) = BaseType::from_token(&column.raw_type) else {
        warnings.push(format!(
            "column '{}': unknown type '{}', using NVARCHAR(MAX)",
            column.name, column.raw_type
        ));
        return (
            SqlType::String(BaseType::NVarChar, StringLength::Max),
            warnings,
        );
    };

    let sql_type = match base {
        b if b.is_string() => match column.length {
            Some(n) if n > 0 => {
                if let Some(limit) = b.max_length().filter(|limit| n > *limit) {
                    warnings.push(format!(
                        "column '{}': length {} exceeds the {} limit of {}",
                        column.name,
                        n,
                        b.keyword(),
                        limit
                    ));
                }
                SqlType::String(b, StringLength::Chars(n))
            }
            Some(n) => {
                warnings.push(format!(
                    "column '{}': invalid length {} for {}, using MAX",
                    column.name,
                    n,
                    b.keyword()
                ));
                SqlType::String(b, StringLength::Max)
            }
            None => SqlType::String(b, StringLength::Max),
        },
        BaseType::Decimal => {
            let mut precision = column
                .length
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_DECIMAL_PRECISION);
            if precision > MAX_DECIMAL_PRECISION {
                warnings.push(format!(
                    "column '{}': precision {} clamped to {}",
                    column.name, precision, MAX_DECIMAL_PRECISION
                ));
                precision = MAX_DECIMAL_PRECISION;
            }
            let mut scale = column.decimal_places.map(i64::from).unwrap_or(0);
            if scale > precision {
                warnings.push(format!(
                    "column '{}': scale {} clamped to precision {}",
                    column.name, scale, precision
                ));
                scale = precision;
            }
            SqlType::Decimal { precision, scale }
        }
        BaseType::Int => match column.length {
            Some(n) if n > INT_DIGIT_LIMIT => SqlType::Plain(BaseType::BigInt),
            _ => SqlType::Plain(BaseType::Int),
        },
        other => SqlType::Plain(other),
    };

    (sql_type, warnings)
}

/// Structured SQL type of a column. Substitutions are logged.
pub fn sql_type(column: &ColumnSpec) -> SqlType {
    let (sql_type, warnings) = resolve(column);
    for warning in &warnings {
        warn!("{}", warning);
    }
    sql_type
}

/// Substitutions the mapper makes for `column`, without logging them
pub fn mapping_warnings(column: &ColumnSpec) -> Vec<String> {
    resolve(column).1
}

/// Full column type fragment: type, nullability and optional default.
///
/// ```
/// use rust_sheetschema::mapping::map_type;
/// use rust_sheetschema::model::ColumnSpec;
///
/// let column = ColumnSpec::new("amount", "decimal")
///     .with_length(10)
///     .with_decimal_places(2);
/// assert_eq!(map_type(&column), "DECIMAL(10,2) NULL");
/// ```
pub fn map_type(column: &ColumnSpec) -> String {
    let sql_type = sql_type(column);
    let mut fragment = sql_type.to_string();
    fragment.push_str(if column.nullable { " NULL" } else { " NOT NULL" });

    if let Some(literal) = render_default(column, &sql_type) {
        fragment.push_str(" DEFAULT ");
        fragment.push_str(&literal);
    }

    debug!(column = %column.name, sql = %fragment, "Mapped column");
    fragment
}

/// Default literal for a column rendered as `sql_type`, if it has one
pub fn render_default(column: &ColumnSpec, sql_type: &SqlType) -> Option<String> {
    let value = column.default_value.as_deref()?;
    let literal = if sql_type.is_string() {
        format!("N'{}'", escape_quotes(value))
    } else if sql_type.base() == BaseType::Bit {
        if is_marker(value, &["Y", "1", "TRUE"]) {
            "1".to_string()
        } else {
            "0".to_string()
        }
    } else {
        format!("'{}'", escape_quotes(value))
    };
    Some(literal)
}

/// Double every single quote for use inside a SQL string literal
pub fn escape_quotes(value: &str) -> String {
    value.replace('\'', "''")
}
