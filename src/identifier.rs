use std::fmt;

/// An identifier already escaped by a provider for inclusion in SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotedIdentifier(String);

impl QuotedIdentifier {
    /// Wrap text that has already been escaped. Prefer
    /// [`IdentifierQuoter::quote_identifier`] for raw names.
    #[must_use]
    pub fn from_quoted(quoted: impl Into<String>) -> Self {
        Self(quoted.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuotedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escapes raw names with a backend's quoting rules.
pub trait IdentifierQuoter {
    fn quote_identifier(&self, raw: &str) -> QuotedIdentifier;
}

/// `server.database.schema.object`, with absent parts left out.
///
/// ```rust
/// use sql_facade::identifier::{FullyQualifiedIdentifier, IdentifierQuoter, QuotedIdentifier};
///
/// struct Brackets;
/// impl IdentifierQuoter for Brackets {
///     fn quote_identifier(&self, raw: &str) -> QuotedIdentifier {
///         QuotedIdentifier::from_quoted(format!("[{}]", raw.replace(']', "]]")))
///     }
/// }
///
/// let id = FullyQualifiedIdentifier::new(&Brackets, "", "sales", "dbo", "orders");
/// assert_eq!(id.to_string(), "[sales].[dbo].[orders]");
/// assert!(id.server().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FullyQualifiedIdentifier {
    server: Option<QuotedIdentifier>,
    database: Option<QuotedIdentifier>,
    schema: Option<QuotedIdentifier>,
    object: Option<QuotedIdentifier>,
}

impl FullyQualifiedIdentifier {
    #[must_use]
    pub fn new<Q: IdentifierQuoter + ?Sized>(
        quoter: &Q,
        server: &str,
        database: &str,
        schema: &str,
        object: &str,
    ) -> Self {
        let quote = |part: &str| (!part.is_empty()).then(|| quoter.quote_identifier(part));
        Self {
            server: quote(server),
            database: quote(database),
            schema: quote(schema),
            object: quote(object),
        }
    }

    #[must_use]
    pub fn schema_object<Q: IdentifierQuoter + ?Sized>(quoter: &Q, schema: &str, object: &str) -> Self {
        Self::new(quoter, "", "", schema, object)
    }

    #[must_use]
    pub fn object<Q: IdentifierQuoter + ?Sized>(quoter: &Q, object: &str) -> Self {
        Self::new(quoter, "", "", "", object)
    }

    #[must_use]
    pub fn server(&self) -> Option<&QuotedIdentifier> {
        self.server.as_ref()
    }

    #[must_use]
    pub fn database(&self) -> Option<&QuotedIdentifier> {
        self.database.as_ref()
    }

    #[must_use]
    pub fn schema(&self) -> Option<&QuotedIdentifier> {
        self.schema.as_ref()
    }

    #[must_use]
    pub fn object_name(&self) -> Option<&QuotedIdentifier> {
        self.object.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts().next().is_none()
    }

    fn parts(&self) -> impl Iterator<Item = &QuotedIdentifier> {
        [&self.server, &self.database, &self.schema, &self.object]
            .into_iter()
            .flatten()
    }
}

impl fmt::Display for FullyQualifiedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(part.as_str())?;
        }
        Ok(())
    }
}

/// Double-quote quoting used by `SQLite` and ANSI SQL.
#[must_use]
pub fn quote_double(raw: &str) -> QuotedIdentifier {
    QuotedIdentifier(format!("\"{}\"", raw.replace('"', "\"\"")))
}

/// Square-bracket quoting used by SQL Server.
#[must_use]
pub fn quote_bracket(raw: &str) -> QuotedIdentifier {
    QuotedIdentifier(format!("[{}]", raw.replace(']', "]]")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ansi;

    impl IdentifierQuoter for Ansi {
        fn quote_identifier(&self, raw: &str) -> QuotedIdentifier {
            quote_double(raw)
        }
    }

    #[test]
    fn renders_all_parts_in_order() {
        let id = FullyQualifiedIdentifier::new(&Ansi, "srv", "db", "dbo", "t");
        assert_eq!(id.to_string(), r#""srv"."db"."dbo"."t""#);
    }

    #[test]
    fn empty_parts_leave_no_separator() {
        let id = FullyQualifiedIdentifier::new(&Ansi, "srv", "", "", "t");
        assert_eq!(id.to_string(), r#""srv"."t""#);
        assert!(id.database().is_none());
        assert!(id.schema().is_none());

        let id = FullyQualifiedIdentifier::new(&Ansi, "", "", "dbo", "");
        assert_eq!(id.to_string(), r#""dbo""#);
    }

    #[test]
    fn all_empty_renders_empty() {
        let id = FullyQualifiedIdentifier::new(&Ansi, "", "", "", "");
        assert!(id.is_empty());
        assert_eq!(id.to_string(), "");
    }

    #[test]
    fn quoting_escapes_delimiters() {
        assert_eq!(quote_double(r#"we"ird"#).as_str(), r#""we""ird""#);
        assert_eq!(quote_bracket("my]table").as_str(), "[my]]table]");
        assert_eq!(quote_bracket("dbo").as_str(), "[dbo]");
    }

    #[test]
    fn empty_string_differs_from_absent() {
        let empty = QuotedIdentifier::from_quoted("");
        let id = FullyQualifiedIdentifier::object(&Ansi, "");
        assert!(id.object_name().is_none());
        assert_eq!(empty.as_str(), "");
    }
}
