//! Table-type columns from the system catalog.

use crate::error::Result;
use crate::session::{read_rows, DbRow, DbValue, SqlSession};
use crate::types::{FieldDescriptor, ObjectName, ResultSet, SqlType};

/// Columns of a user-defined table type, in declaration order.
///
/// `@P1` is the type name, `@P2` its schema.
pub const TABLE_TYPE_COLUMNS_SQL: &str = "\
SELECT c.name AS ColumnName,
    t.name AS TypeName,
    c.is_nullable
FROM sys.columns c
    INNER JOIN sys.types t ON t.user_type_id = c.user_type_id
WHERE c.object_id IN (
    SELECT tt.type_table_object_id
    FROM sys.table_types tt
        INNER JOIN sys.schemas sc ON sc.schema_id = tt.schema_id
    WHERE tt.name = @P1 AND sc.name = @P2
)
ORDER BY c.column_id";

/// Resolve the columns of table type `table_type`.
///
/// Errors from the session are returned as-is; there is no cache for table types.
/// An unknown type yields an empty result set.
pub fn table_type_fields<S>(session: &S, table_type: &ObjectName) -> Result<ResultSet>
where
    S: SqlSession + ?Sized,
{
    let params = [
        DbValue::from(table_type.name.as_str()),
        DbValue::from(table_type.schema.as_str()),
    ];
    let rows = read_rows(&session, TABLE_TYPE_COLUMNS_SQL, &params)?;

    rows.iter()
        .map(field_from_catalog_row)
        .collect::<Result<Vec<_>>>()
        .map(ResultSet::new)
}

fn field_from_catalog_row(row: &DbRow) -> Result<FieldDescriptor> {
    let name: String = row.get_by_name("ColumnName")?;
    let type_name: String = row.get_by_name("TypeName")?;
    let is_nullable: bool = row.get_by_name("is_nullable")?;
    Ok(FieldDescriptor::new(
        name,
        is_nullable,
        SqlType::from_type_name(&type_name),
    ))
}
