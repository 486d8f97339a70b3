//! Built-in conversion rule kinds.
//!
//! Conversions only touch text; typed values and nulls pass through
//! unchanged, except `default_value` which exists to replace nulls.
//!
//! Fixed-width columns combine `multi_pad` on write with `one_side_trim` on
//! read; [`fixed_size`] builds that bundle.

use regex::Regex;
use rowbind_model::{
    Attributes, ComposedRuleSet, ConfigError, Direction, FieldDescriptor, OverrideDirective,
    RowContext, RuleCategory, RuleInstance, Value, ValueKind,
};
use unicode_width::UnicodeWidthChar;

use super::{AttrReader, BOOL, ENTRIES, INTEGER, TEXT, attrs};
use crate::errors::FieldFailure;
use crate::registry::{AttributeKinds, CreateStage, FnFactory, RuleRegistry};
use crate::stage::Stage;

const SCALAR: &[ValueKind] = &[ValueKind::Text, ValueKind::Integer, ValueKind::Float, ValueKind::Bool];
const PAD_KINDS: AttributeKinds = &[("size", INTEGER), ("pad_char", TEXT)];

fn conversion(kind: &'static str, defaults: fn() -> Attributes, create: CreateStage) -> FnFactory {
    FnFactory::new(kind, RuleCategory::Conversion, defaults, create)
}

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.register(conversion("trim", Attributes::new, |_, _| {
        Ok(Box::new(TextMap { op: |s| s.trim().to_string() }))
    }));
    registry.register(conversion("upper", Attributes::new, |_, _| {
        Ok(Box::new(TextMap { op: str::to_uppercase }))
    }));
    registry.register(conversion("lower", Attributes::new, |_, _| {
        Ok(Box::new(TextMap { op: str::to_lowercase }))
    }));
    registry.register(
        conversion("default_value", || attrs([("value", Value::text(""))]), create_default_value)
            .with_kinds(&[("value", SCALAR)]),
    );
    registry.register(
        conversion(
            "null_convert",
            || attrs([("values", Value::List(Vec::new())), ("ignore_case", Value::Bool(false))]),
            create_null_convert,
        )
        .with_kinds(&[("values", ENTRIES), ("ignore_case", BOOL)]),
    );
    registry.register(
        conversion(
            "regex_replace",
            || attrs([("regex", Value::text("")), ("replacement", Value::text(""))]),
            create_regex_replace,
        )
        .with_kinds(&[("regex", TEXT), ("replacement", TEXT)]),
    );
    registry.register(
        conversion(
            "word_replace",
            || attrs([("words", Value::List(Vec::new())), ("replacements", Value::List(Vec::new()))]),
            create_word_replace,
        )
        .with_kinds(&[("words", ENTRIES), ("replacements", ENTRIES)]),
    );
    registry.register(
        conversion("left_pad", pad_defaults, |rule, field| create_pad(rule, field, PadSide::Left))
            .with_kinds(PAD_KINDS),
    );
    registry.register(
        conversion("right_pad", pad_defaults, |rule, field| create_pad(rule, field, PadSide::Right))
            .with_kinds(PAD_KINDS),
    );
    registry.register(
        conversion(
            "truncate",
            || attrs([("max_size", Value::Integer(0)), ("suffix", Value::text(""))]),
            create_truncate,
        )
        .with_kinds(&[("max_size", INTEGER), ("suffix", TEXT)]),
    );
    registry.register(
        conversion(
            "one_side_trim",
            || attrs([("trim_char", Value::text(" ")), ("side", Value::text("right"))]),
            create_one_side_trim,
        )
        .with_kinds(&[("trim_char", TEXT), ("side", TEXT)]),
    );
    registry.register(
        conversion("full_char", || attrs([("categories", Value::List(Vec::new()))]), create_full_char)
            .with_kinds(&[("categories", ENTRIES)]),
    );
    registry.register(
        conversion(
            "multi_pad",
            || {
                attrs([
                    ("size", Value::Integer(0)),
                    ("pad_char", Value::text(" ")),
                    ("side", Value::text("right")),
                    ("chopped", Value::Bool(false)),
                    ("width", Value::text("chars")),
                ])
            },
            create_multi_pad,
        )
        .with_kinds(&[
            ("size", INTEGER),
            ("pad_char", TEXT),
            ("side", TEXT),
            ("chopped", BOOL),
            ("width", TEXT),
        ]),
    );
}

#[derive(Clone)]
struct TextMap {
    op: fn(&str) -> String,
}

impl Stage for TextMap {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        Ok(match value {
            Value::Text(text) => Value::Text((self.op)(&text)),
            other => other,
        })
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

#[derive(Clone)]
struct DefaultValue {
    value: String,
}

fn create_default_value(
    rule: &RuleInstance,
    field: &FieldDescriptor,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    Ok(Box::new(DefaultValue {
        value: attrs.required("value")?.to_string(),
    }))
}

impl Stage for DefaultValue {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        Ok(if value.is_null() {
            Value::text(self.value.clone())
        } else {
            value
        })
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// Turns any of `values` into null.
#[derive(Clone)]
struct NullConvert {
    values: Vec<String>,
    ignore_case: bool,
}

fn create_null_convert(
    rule: &RuleInstance,
    field: &FieldDescriptor,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    Ok(Box::new(NullConvert {
        values: attrs.string_list("values")?,
        ignore_case: attrs.bool_or("ignore_case", false)?,
    }))
}

impl Stage for NullConvert {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        let Value::Text(text) = &value else {
            return Ok(value);
        };
        let matched = self.values.iter().any(|candidate| {
            if self.ignore_case {
                candidate.eq_ignore_ascii_case(text)
            } else {
                candidate == text
            }
        });
        Ok(if matched { Value::Null } else { value })
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

#[derive(Clone)]
struct RegexReplace {
    regex: Regex,
    replacement: String,
}

fn create_regex_replace(
    rule: &RuleInstance,
    field: &FieldDescriptor,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    let source = attrs.text("regex")?;
    let regex = Regex::new(&source).map_err(|e| attrs.invalid("regex", e.to_string()))?;
    Ok(Box::new(RegexReplace {
        regex,
        replacement: attrs.text_or("replacement", "")?,
    }))
}

impl Stage for RegexReplace {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        Ok(match value {
            Value::Text(text) => Value::Text(
                self.regex
                    .replace_all(&text, self.replacement.as_str())
                    .into_owned(),
            ),
            other => other,
        })
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// Replaces each word with its counterpart, longest words first so that
/// a word never clobbers a longer one containing it.
#[derive(Clone)]
struct WordReplace {
    pairs: Vec<(String, String)>,
}

fn create_word_replace(
    rule: &RuleInstance,
    field: &FieldDescriptor,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    let words = attrs.string_list("words")?;
    let replacements = attrs.string_list_or_empty("replacements");
    if words.len() != replacements.len() {
        return Err(attrs.invalid(
            "replacements",
            format!(
                "{} replacement(s) given for {} word(s)",
                replacements.len(),
                words.len()
            ),
        ));
    }
    let mut pairs: Vec<(String, String)> = words.into_iter().zip(replacements).collect();
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    Ok(Box::new(WordReplace { pairs }))
}

impl Stage for WordReplace {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        let mut text = match value {
            Value::Text(text) => text,
            other => return Ok(other),
        };
        for (word, replacement) in &self.pairs {
            if !word.is_empty() && text.contains(word.as_str()) {
                text = text.replace(word.as_str(), replacement);
            }
        }
        Ok(Value::Text(text))
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Copy)]
enum PadSide {
    Left,
    Right,
}

#[derive(Clone)]
struct Pad {
    side: PadSide,
    size: usize,
    pad_char: char,
}

fn pad_defaults() -> Attributes {
    attrs([("size", Value::Integer(0)), ("pad_char", Value::text(" "))])
}

fn create_pad(
    rule: &RuleInstance,
    field: &FieldDescriptor,
    side: PadSide,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    Ok(Box::new(Pad {
        side,
        size: attrs.usize("size")?,
        pad_char: single_char(&attrs, "pad_char", ' ')?,
    }))
}

fn single_char(attrs: &AttrReader<'_>, name: &str, default: char) -> Result<char, ConfigError> {
    let text = attrs.text_or(name, &default.to_string())?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(attrs.invalid(name, "expected exactly one character")),
    }
}

fn side(attrs: &AttrReader<'_>) -> Result<PadSide, ConfigError> {
    match attrs.text_or("side", "right")?.as_str() {
        "left" => Ok(PadSide::Left),
        "right" => Ok(PadSide::Right),
        other => Err(attrs.invalid("side", format!("expected 'left' or 'right', got '{other}'"))),
    }
}

impl Stage for Pad {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        let text = match value {
            Value::Text(text) => text,
            other => return Ok(other),
        };
        let width = text.chars().count();
        if width >= self.size {
            return Ok(Value::Text(text));
        }
        let padding: String = std::iter::repeat_n(self.pad_char, self.size - width).collect();
        Ok(Value::Text(match self.side {
            PadSide::Left => padding + &text,
            PadSide::Right => text + &padding,
        }))
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// Cuts text to `max_size` characters, the suffix included.
#[derive(Clone)]
struct Truncate {
    max_size: usize,
    suffix: String,
}

fn create_truncate(
    rule: &RuleInstance,
    field: &FieldDescriptor,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    let max_size = attrs.usize("max_size")?;
    let suffix = attrs.text_or("suffix", "")?;
    if max_size == 0 || suffix.chars().count() >= max_size {
        return Err(attrs.invalid(
            "max_size",
            "must be positive and longer than the suffix",
        ));
    }
    Ok(Box::new(Truncate { max_size, suffix }))
}

impl Stage for Truncate {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        let text = match value {
            Value::Text(text) => text,
            other => return Ok(other),
        };
        if text.chars().count() <= self.max_size {
            return Ok(Value::Text(text));
        }
        let keep = self.max_size - self.suffix.chars().count();
        let mut cut: String = text.chars().take(keep).collect();
        cut.push_str(&self.suffix);
        Ok(Value::Text(cut))
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// Strips repeats of one character from one end only.
#[derive(Clone)]
struct OneSideTrim {
    trim_char: char,
    side: PadSide,
}

fn create_one_side_trim(
    rule: &RuleInstance,
    field: &FieldDescriptor,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    Ok(Box::new(OneSideTrim {
        trim_char: single_char(&attrs, "trim_char", ' ')?,
        side: side(&attrs)?,
    }))
}

impl Stage for OneSideTrim {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        Ok(match value {
            Value::Text(text) => Value::text(match self.side {
                PadSide::Left => text.trim_start_matches(self.trim_char),
                PadSide::Right => text.trim_end_matches(self.trim_char),
            }),
            other => other,
        })
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// ASCII character groups `full_char` can widen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharCategory {
    Number,
    Alpha,
    Symbol,
    Space,
}

impl CharCategory {
    const ALL: [CharCategory; 4] = [Self::Number, Self::Alpha, Self::Symbol, Self::Space];

    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "number" => Some(Self::Number),
            "alpha" => Some(Self::Alpha),
            "symbol" => Some(Self::Symbol),
            "space" => Some(Self::Space),
            _ => None,
        }
    }

    fn of(c: char) -> Option<Self> {
        match c {
            '0'..='9' => Some(Self::Number),
            'a'..='z' | 'A'..='Z' => Some(Self::Alpha),
            ' ' => Some(Self::Space),
            c if c.is_ascii_punctuation() => Some(Self::Symbol),
            _ => None,
        }
    }
}

/// Half-width ASCII to the full-width forms block; space becomes the
/// ideographic space.
fn to_full_width(c: char) -> char {
    match c {
        ' ' => '\u{3000}',
        '!'..='~' => char::from_u32(u32::from(c) + 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

#[derive(Clone)]
struct FullChar {
    categories: Vec<CharCategory>,
}

fn create_full_char(
    rule: &RuleInstance,
    field: &FieldDescriptor,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    let names = attrs.string_list_or_empty("categories");
    let categories = if names.is_empty() {
        CharCategory::ALL.to_vec()
    } else {
        names
            .iter()
            .map(|name| {
                CharCategory::parse(name)
                    .ok_or_else(|| attrs.invalid("categories", format!("unknown category '{name}'")))
            })
            .collect::<Result<_, _>>()?
    };
    Ok(Box::new(FullChar { categories }))
}

impl Stage for FullChar {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        Ok(match value {
            Value::Text(text) => Value::Text(
                text.chars()
                    .map(|c| match CharCategory::of(c) {
                        Some(category) if self.categories.contains(&category) => to_full_width(c),
                        _ => c,
                    })
                    .collect(),
            ),
            other => other,
        })
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// How `multi_pad` measures text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PadWidth {
    Chars,
    /// Terminal columns; East Asian wide characters count twice.
    Display,
    Utf8Bytes,
}

impl PadWidth {
    fn of(self, c: char) -> usize {
        match self {
            PadWidth::Chars => 1,
            PadWidth::Display => c.width().unwrap_or(0),
            PadWidth::Utf8Bytes => c.len_utf8(),
        }
    }

    fn measure(self, text: &str) -> usize {
        text.chars().map(|c| self.of(c)).sum()
    }
}

/// Pads to `size` width units, optionally chopping longer text from the
/// padded side.
#[derive(Clone)]
struct MultiPad {
    size: usize,
    pad_char: char,
    side: PadSide,
    chopped: bool,
    width: PadWidth,
}

fn create_multi_pad(
    rule: &RuleInstance,
    field: &FieldDescriptor,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    let size = attrs.usize("size")?;
    if size == 0 {
        return Err(attrs.invalid("size", "must be positive"));
    }
    let width = match attrs.text_or("width", "chars")?.as_str() {
        "chars" => PadWidth::Chars,
        "display" => PadWidth::Display,
        "utf8_bytes" => PadWidth::Utf8Bytes,
        other => {
            return Err(attrs.invalid(
                "width",
                format!("expected 'chars', 'display' or 'utf8_bytes', got '{other}'"),
            ));
        }
    };
    let pad_char = single_char(&attrs, "pad_char", ' ')?;
    if width.of(pad_char) == 0 {
        return Err(attrs.invalid("pad_char", "has no width"));
    }
    Ok(Box::new(MultiPad {
        size,
        pad_char,
        side: side(&attrs)?,
        chopped: attrs.bool_or("chopped", false)?,
        width,
    }))
}

impl MultiPad {
    fn pad(&self, text: &str) -> String {
        let mut current = self.width.measure(text);
        let mut text = text.to_string();
        if current > self.size {
            if !self.chopped {
                return text;
            }
            while current > self.size {
                let removed = match self.side {
                    PadSide::Left => (!text.is_empty()).then(|| text.remove(0)),
                    PadSide::Right => text.pop(),
                };
                match removed {
                    Some(c) => current -= self.width.of(c),
                    None => break,
                }
            }
        }
        let count = (self.size - current) / self.width.of(self.pad_char);
        let padding: String = std::iter::repeat_n(self.pad_char, count).collect();
        match self.side {
            PadSide::Left => padding + &text,
            PadSide::Right => text + &padding,
        }
    }
}

impl Stage for MultiPad {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        Ok(match value {
            Value::Text(text) => Value::Text(self.pad(&text)),
            other => other,
        })
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// Bundle for fixed-width columns: pads to `size` display columns on write
/// and trims the padding on read.
///
/// The bundle's `size`, `pad_char`, `side` and `chopped` attributes flow
/// into both rules, so a use can override them in one place.
pub fn fixed_size(size: usize) -> ComposedRuleSet {
    ComposedRuleSet::new("fixed_size")
        .with_attr("size", size)
        .with_attr("pad_char", " ")
        .with_attr("side", "right")
        .with_attr("chopped", false)
        .with_rule(
            RuleInstance::new("multi_pad")
                .with_attr("width", "display")
                .for_direction(Direction::Write),
        )
        .with_rule(RuleInstance::new("one_side_trim").for_direction(Direction::Read))
        .with_override(OverrideDirective::new("size", "multi_pad"))
        .with_override(OverrideDirective::new("pad_char", "multi_pad"))
        .with_override(OverrideDirective::new("side", "multi_pad"))
        .with_override(OverrideDirective::new("chopped", "multi_pad"))
        .with_override(OverrideDirective::new("pad_char", "one_side_trim").attribute("trim_char"))
        .with_override(OverrideDirective::new("side", "one_side_trim"))
}

#[cfg(test)]
mod tests {
    use rowbind_model::FieldType;

    use super::*;
    use crate::registry::default_registry;

    fn field() -> FieldDescriptor {
        FieldDescriptor {
            name: "code".to_string(),
            field_type: FieldType::String,
            position: 1,
            label: None,
            format: Attributes::new(),
            rules: Vec::new(),
            partial: false,
        }
    }

    fn run(rule: RuleInstance, input: Value) -> Value {
        let stage = default_registry()
            .get(&rule.kind)
            .unwrap()
            .create(&rule, &field());
        stage
            .unwrap()
            .execute(input, &RowContext::new(1, 1))
            .unwrap()
    }

    #[test]
    fn text_maps_skip_non_text() {
        assert_eq!(run(RuleInstance::new("trim"), Value::text("  a ")), Value::text("a"));
        assert_eq!(run(RuleInstance::new("upper"), Value::Integer(3)), Value::Integer(3));
        assert_eq!(run(RuleInstance::new("lower"), Value::Null), Value::Null);
    }

    #[test]
    fn default_and_null_convert() {
        let default = RuleInstance::new("default_value").with_attr("value", "n/a");
        assert_eq!(run(default.clone(), Value::Null), Value::text("n/a"));
        assert_eq!(run(default, Value::text("x")), Value::text("x"));

        let nulls = RuleInstance::new("null_convert")
            .with_attr("values", Value::text_list(["NA", "-"]))
            .with_attr("ignore_case", true);
        assert_eq!(run(nulls.clone(), Value::text("na")), Value::Null);
        assert_eq!(run(nulls, Value::text("0")), Value::text("0"));
    }

    #[test]
    fn replacements() {
        let regex = RuleInstance::new("regex_replace")
            .with_attr("regex", r"\s+")
            .with_attr("replacement", " ");
        assert_eq!(run(regex, Value::text("a \t b")), Value::text("a b"));

        let words = RuleInstance::new("word_replace")
            .with_attr("words", Value::text_list(["cat", "category"]))
            .with_attr("replacements", Value::text_list(["dog", "kind"]));
        assert_eq!(run(words, Value::text("category cat")), Value::text("kind dog"));
    }

    #[test]
    fn padding_and_truncation() {
        let left = RuleInstance::new("left_pad")
            .with_attr("size", 5_i64)
            .with_attr("pad_char", "0");
        assert_eq!(run(left, Value::text("42")), Value::text("00042"));

        let right = RuleInstance::new("right_pad").with_attr("size", 3_i64);
        assert_eq!(run(right, Value::text("abcd")), Value::text("abcd"));

        let cut = RuleInstance::new("truncate")
            .with_attr("max_size", 6_i64)
            .with_attr("suffix", "...");
        assert_eq!(run(cut, Value::text("abcdefgh")), Value::text("abc..."));
    }

    #[test]
    fn one_side_trim_keeps_the_other_end() {
        let right = RuleInstance::new("one_side_trim");
        assert_eq!(run(right, Value::text("  ab  ")), Value::text("  ab"));

        let left = RuleInstance::new("one_side_trim")
            .with_attr("side", "left")
            .with_attr("trim_char", "0");
        assert_eq!(run(left.clone(), Value::text("00120")), Value::text("120"));
        assert_eq!(run(left, Value::text("000")), Value::text(""));
    }

    #[test]
    fn full_char_widens_selected_categories() {
        let all = RuleInstance::new("full_char");
        assert_eq!(
            run(all, Value::text("abc_ABC_012 !@")),
            Value::text("ａｂｃ＿ＡＢＣ＿０１２\u{3000}！＠")
        );

        let some = RuleInstance::new("full_char").with_attr("categories", Value::text_list(["number", "alpha"]));
        assert_eq!(run(some, Value::text("abc_ABC_012 !@")), Value::text("ａｂｃ_ＡＢＣ_０１２ !@"));
    }

    #[test]
    fn multi_pad_measures_display_width() {
        let display = RuleInstance::new("multi_pad")
            .with_attr("size", 6_i64)
            .with_attr("width", "display");
        assert_eq!(run(display.clone(), Value::text("あい")), Value::text("あい  "));
        assert_eq!(run(display, Value::text("あいうえお")), Value::text("あいうえお"));

        let chopped = RuleInstance::new("multi_pad")
            .with_attr("size", 5_i64)
            .with_attr("width", "display")
            .with_attr("side", "left")
            .with_attr("pad_char", "*")
            .with_attr("chopped", true);
        assert_eq!(run(chopped, Value::text("あいう")), Value::text("*いう"));

        let bytes = RuleInstance::new("multi_pad")
            .with_attr("size", 4_i64)
            .with_attr("width", "utf8_bytes");
        assert_eq!(run(bytes, Value::text("é")), Value::text("é  "));
    }

    #[test]
    fn bad_attributes_fail_at_create() {
        let registry = default_registry();
        let bad_regex = RuleInstance::new("regex_replace").with_attr("regex", "(");
        assert!(matches!(
            registry.get("regex_replace").unwrap().create(&bad_regex, &field()),
            Err(ConfigError::InvalidAttribute { ref attribute, .. }) if attribute == "regex"
        ));

        let uneven = RuleInstance::new("word_replace")
            .with_attr("words", Value::text_list(["a", "b"]))
            .with_attr("replacements", Value::text_list(["c"]));
        assert!(registry.get("word_replace").unwrap().create(&uneven, &field()).is_err());

        let no_size = RuleInstance::new("multi_pad").with_attr("size", 0_i64);
        assert!(registry.get("multi_pad").unwrap().create(&no_size, &field()).is_err());
        let bad_side = RuleInstance::new("one_side_trim").with_attr("side", "both");
        assert!(matches!(
            registry.get("one_side_trim").unwrap().create(&bad_side, &field()),
            Err(ConfigError::InvalidAttribute { ref attribute, .. }) if attribute == "side"
        ));
    }
}
