//! Column definition for Tessera schemas.

use crate::expr::ExprRef;
use crate::types::DataType;

/// When an identity column accepts user-supplied values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentityMode {
    /// `GENERATED ALWAYS AS IDENTITY`: user values need `OVERRIDING SYSTEM VALUE`.
    Always,
    /// `GENERATED BY DEFAULT AS IDENTITY`: user values win unless
    /// `OVERRIDING USER VALUE` is given.
    ByDefault,
}

/// Identity generation settings of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdentitySpec {
    pub mode: IdentityMode,
    pub start: i64,
    pub increment: i64,
}

impl IdentitySpec {
    /// Identity starting at 1, step 1.
    pub fn new(mode: IdentityMode) -> Self {
        Self {
            mode,
            start: 1,
            increment: 1,
        }
    }

    /// Sets the first generated value.
    pub fn start(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    /// Sets the step between generated values.
    pub fn increment(mut self, increment: i64) -> Self {
        self.increment = increment;
        self
    }
}

/// A column definition in a table schema.
#[derive(Clone, Debug)]
pub struct ColumnDef {
    /// Column name.
    name: String,
    /// Data type of the column.
    data_type: DataType,
    /// Whether this column allows null values.
    nullable: bool,
    /// Default expression, evaluated when an insert omits the column.
    default: Option<ExprRef>,
    /// Whether the column draws absent values from an owned sequence.
    serial: bool,
    identity: Option<IdentitySpec>,
    /// Expression of a generated (computed) column.
    generated: Option<ExprRef>,
}

impl ColumnDef {
    /// Creates a new nullable column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            serial: false,
            identity: None,
            generated: None,
        }
    }

    /// Sets whether this column is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Marks the column `NOT NULL`.
    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    /// Sets the default expression for this column.
    pub fn default_expr(mut self, expr: ExprRef) -> Self {
        self.default = Some(expr);
        self
    }

    /// Makes the column a serial column.
    pub fn serial(mut self) -> Self {
        self.serial = true;
        self
    }

    /// Makes the column an identity column.
    pub fn identity(mut self, spec: IdentitySpec) -> Self {
        self.identity = Some(spec);
        self
    }

    /// Makes the column a generated (computed) column.
    pub fn generated(mut self, expr: ExprRef) -> Self {
        self.generated = Some(expr);
        self
    }

    /// Returns the column name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the data type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns whether this column is nullable.
    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns the default expression.
    #[inline]
    pub fn default(&self) -> Option<&ExprRef> {
        self.default.as_ref()
    }

    #[inline]
    pub fn is_serial(&self) -> bool {
        self.serial
    }

    #[inline]
    pub fn identity_spec(&self) -> Option<&IdentitySpec> {
        self.identity.as_ref()
    }

    /// Returns the expression of a generated column.
    #[inline]
    pub fn generated_expr(&self) -> Option<&ExprRef> {
        self.generated.as_ref()
    }

    /// Returns whether this column can be used as an index key.
    #[inline]
    pub fn is_indexable(&self) -> bool {
        self.data_type.is_indexable()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
    }

    pub fn set_nullable(&mut self, nullable: bool) {
        self.nullable = nullable;
    }

    pub fn set_default(&mut self, default: Option<ExprRef>) {
        self.default = default;
    }

    pub fn set_identity(&mut self, identity: Option<IdentitySpec>) {
        self.identity = identity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lit;

    #[test]
    fn test_column_new() {
        let col = ColumnDef::new("id", DataType::Int64);
        assert_eq!(col.name(), "id");
        assert_eq!(col.data_type(), DataType::Int64);
        assert!(col.is_nullable());
        assert!(col.default().is_none());
        assert!(!col.is_serial());
    }

    #[test]
    fn test_column_builder() {
        let col = ColumnDef::new("name", DataType::String)
            .not_null()
            .default_expr(lit("unknown"));
        assert!(!col.is_nullable());
        assert!(col.default().is_some());
    }

    #[test]
    fn test_identity_spec() {
        let col = ColumnDef::new("id", DataType::Int32)
            .identity(IdentitySpec::new(IdentityMode::Always).start(10).increment(5));
        let spec = col.identity_spec().unwrap();
        assert_eq!(spec.mode, IdentityMode::Always);
        assert_eq!(spec.start, 10);
        assert_eq!(spec.increment, 5);
    }
}
