use crate::style::FieldStyle;
use crate::types::Rect;

/// A named, editable text region registered on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub value: String,
    pub rect: Rect,
    pub multiline: bool,
    pub style: FieldStyle,
}

impl FormField {
    pub fn single_line(
        name: impl Into<String>,
        value: impl Into<String>,
        rect: Rect,
        style: FieldStyle,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            rect,
            multiline: false,
            style,
        }
    }

    pub fn multi_line(
        name: impl Into<String>,
        value: impl Into<String>,
        rect: Rect,
        style: FieldStyle,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            rect,
            multiline: true,
            style,
        }
    }

    /// Lines of the initial value as they appear in the field's appearance stream.
    pub fn value_lines(&self) -> Vec<&str> {
        if self.multiline {
            self.value.split('\n').map(|l| l.trim_end_matches('\r')).collect()
        } else {
            let first = self.value.lines().next().unwrap_or("");
            vec![first]
        }
    }
}
