//! Static table declarations.
//!
//! The mapping between model fields and columns is spelled out here once and
//! the repository builds its statements from it.

/// Column storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Serial,
    VarChar(u16),
    Boolean,
    TimestampTz,
}

impl ColumnType {
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Serial => "SERIAL".to_string(),
            ColumnType::VarChar(len) => format!("VARCHAR({})", len),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::TimestampTz => "TIMESTAMPTZ".to_string(),
        }
    }
}

/// One field-to-column mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Field name on the model.
    pub field: &'static str,
    /// Column name in the table.
    pub column: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// SQL default expression.
    pub default: Option<&'static str>,
    pub primary_key: bool,
    /// Assigned by the store, never written by callers.
    pub system_managed: bool,
}

impl ColumnDef {
    /// Column name quoted as an identifier.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.column)
    }

    /// Column clause for `CREATE TABLE`.
    pub fn ddl(&self) -> String {
        let mut clause = format!("{} {}", self.quoted(), self.column_type.sql());
        if self.primary_key {
            clause.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            clause.push_str(" NOT NULL");
        }
        if let Some(default) = self.default {
            clause.push_str(" DEFAULT ");
            clause.push_str(default);
        }
        clause
    }
}

/// A table and its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    pub fn column(&self, field: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Quoted column name for `field`, for building this crate's statements.
    /// Panics on an undeclared field; every statement using it is built in
    /// the repository tests.
    pub(crate) fn col(&self, field: &str) -> String {
        match self.column(field) {
            Some(column) => column.quoted(),
            None => panic!("table {} has no field {}", self.name, field),
        }
    }

    /// Comma separated list of every column, in declaration order.
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(ColumnDef::quoted)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Columns callers may write.
    pub fn insertable(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.system_managed)
    }

    pub fn create_table_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(ColumnDef::ddl)
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({})", self.name, columns)
    }
}

/// The `tutorials` table.
pub static TUTORIALS: TableSchema = TableSchema {
    name: "tutorials",
    columns: &[
        ColumnDef {
            field: "id",
            column: "id",
            column_type: ColumnType::Serial,
            nullable: false,
            default: None,
            primary_key: true,
            system_managed: true,
        },
        ColumnDef {
            field: "title",
            column: "title",
            column_type: ColumnType::VarChar(255),
            nullable: false,
            default: None,
            primary_key: false,
            system_managed: false,
        },
        ColumnDef {
            field: "description",
            column: "description",
            column_type: ColumnType::VarChar(255),
            nullable: true,
            default: None,
            primary_key: false,
            system_managed: false,
        },
        ColumnDef {
            field: "published",
            column: "published",
            column_type: ColumnType::Boolean,
            nullable: false,
            default: Some("false"),
            primary_key: false,
            system_managed: false,
        },
        ColumnDef {
            field: "created_at",
            column: "createdAt",
            column_type: ColumnType::TimestampTz,
            nullable: false,
            default: Some("NOW()"),
            primary_key: false,
            system_managed: true,
        },
        ColumnDef {
            field: "updated_at",
            column: "updatedAt",
            column_type: ColumnType::TimestampTz,
            nullable: false,
            default: Some("NOW()"),
            primary_key: false,
            system_managed: true,
        },
    ],
};
