//! Message code chains, most specific first.

/// Builds the code chain tried against a [`crate::MessageResolver`]:
/// `code.record.field`, `code.field`, `code.type`, `code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCodeGenerator {
    /// Prepended to the record-qualified code only.
    pub prefix: String,
    pub type_mismatch_code: String,
}

impl Default for MessageCodeGenerator {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            type_mismatch_code: "typeMismatch".to_string(),
        }
    }
}

impl MessageCodeGenerator {
    pub fn generate_codes(
        &self,
        code: &str,
        record: Option<&str>,
        field: Option<&str>,
        type_name: Option<&str>,
    ) -> Vec<String> {
        let mut codes = Vec::new();
        if let (Some(record), Some(field)) = (record, field) {
            push_unique(&mut codes, format!("{}{code}.{record}.{field}", self.prefix));
        }
        if let Some(field) = field {
            push_unique(&mut codes, format!("{code}.{field}"));
        }
        if let Some(type_name) = type_name {
            push_unique(&mut codes, format!("{code}.{type_name}"));
            if matches!(type_name, "integer" | "float" | "decimal") {
                push_unique(&mut codes, format!("{code}.number"));
            }
        }
        push_unique(&mut codes, code.to_string());
        codes
    }

    pub fn generate_type_mismatch_codes(
        &self,
        record: Option<&str>,
        field: Option<&str>,
        type_name: Option<&str>,
    ) -> Vec<String> {
        self.generate_codes(&self.type_mismatch_code, record, field, type_name)
    }
}

fn push_unique(codes: &mut Vec<String>, code: String) {
    if !codes.contains(&code) {
        codes.push(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_chain() {
        let generator = MessageCodeGenerator::default();
        assert_eq!(
            generator.generate_codes("length_max", Some("user"), Some("email"), Some("string")),
            vec!["length_max.user.email", "length_max.email", "length_max.string", "length_max"]
        );
    }

    #[test]
    fn numeric_types_fall_back_to_number() {
        let generator = MessageCodeGenerator::default();
        assert_eq!(
            generator.generate_type_mismatch_codes(None, Some("age"), Some("integer")),
            vec!["typeMismatch.age", "typeMismatch.integer", "typeMismatch.number", "typeMismatch"]
        );
    }

    #[test]
    fn prefix_applies_to_record_code() {
        let generator = MessageCodeGenerator {
            prefix: "csv.".to_string(),
            ..MessageCodeGenerator::default()
        };
        let codes = generator.generate_codes("require", Some("user"), Some("id"), None);
        assert_eq!(codes, vec!["csv.require.user.id", "require.id", "require"]);
    }
}
