//! Minimal INI encoder for fail2ban configuration files.
//!
//! Sections and keys keep insertion order so output is byte-stable.
//! A key with several values is written as `key = first` followed by
//! indented continuation lines, which is how fail2ban reads `logpath`.

use std::fmt::{self, Write as _};

const CONTINUATION_INDENT: &str = "          ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    entries: Vec<(String, Vec<String>)>,
}

impl IniSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a single-valued key. Replaces an earlier value for the key.
    pub fn set(&mut self, key: &str, value: impl fmt::Display) -> &mut Self {
        self.set_many(key, [value.to_string()])
    }

    /// Set a multi-valued key. Replaces an earlier value for the key.
    pub fn set_many<I, S>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = values,
            None => self.entries.push((key.to_string(), values)),
        }
        self
    }

    /// Set only when `value` is present; absent values are not written.
    pub fn set_opt<T: fmt::Display>(&mut self, key: &str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.set(key, v);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn render_into(&self, out: &mut String) {
        let _ = writeln!(out, "[{}]", self.name);
        for (key, values) in &self.entries {
            match values.split_first() {
                None => {
                    let _ = writeln!(out, "{} =", key);
                }
                Some((first, rest)) if first.is_empty() && rest.is_empty() => {
                    let _ = writeln!(out, "{} =", key);
                }
                Some((first, rest)) => {
                    let _ = writeln!(out, "{} = {}", key, first);
                    for value in rest {
                        let _ = writeln!(out, "{}{}", CONTINUATION_INDENT, value);
                    }
                }
            }
        }
    }
}

/// A whole file: optional leading comment block, then sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    header: Vec<String>,
    sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, line: &str) -> Self {
        self.header.push(line.to_string());
        self
    }

    pub fn push(&mut self, section: IniSection) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.header {
            let _ = writeln!(out, "# {}", line);
        }
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 || !self.header.is_empty() {
                out.push('\n');
            }
            section.render_into(&mut out);
        }
        out
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
