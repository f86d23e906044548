//! Cache key generation and normalization.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between page and widget in the rendered key.
pub const KEY_SEPARATOR: &str = "::";

/// Key unica para una ubicacion (page, widget).
/// Normaliza ambos componentes (trim + lowercase) para consistencia.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CacheKey {
    page: String,
    widget: String,
}

impl CacheKey {
    /// Crea una nueva cache key normalizando los valores.
    ///
    /// # Examples
    ///
    /// ```
    /// use vitrine_core::CacheKey;
    ///
    /// let key = CacheKey::new(" Strategy-Plans ", "Roadmap");
    /// assert_eq!(key.page(), "strategy-plans");
    /// assert_eq!(key.widget(), "roadmap");
    /// assert_eq!(key.to_string(), "strategy-plans::roadmap");
    /// ```
    pub fn new(page: impl AsRef<str>, widget: impl AsRef<str>) -> Self {
        Self {
            page: normalize(page.as_ref()),
            widget: normalize(widget.as_ref()),
        }
    }

    /// Retorna el identificador de pagina.
    pub fn page(&self) -> &str {
        &self.page
    }

    /// Retorna el identificador de widget.
    pub fn widget(&self) -> &str {
        &self.widget
    }

    /// Normalized page id, as stored in keys.
    ///
    /// ```
    /// use vitrine_core::CacheKey;
    ///
    /// assert_eq!(CacheKey::page_id(" Home "), "home");
    /// ```
    pub fn page_id(page: impl AsRef<str>) -> String {
        normalize(page.as_ref())
    }

    /// Key del mismo widget en otra pagina.
    pub fn with_page(&self, page: impl AsRef<str>) -> Self {
        Self {
            page: normalize(page.as_ref()),
            widget: self.widget.clone(),
        }
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            escape(&self.page),
            KEY_SEPARATOR,
            escape(&self.widget)
        )
    }
}

/// `%` and `:` are percent-encoded in the rendered key so that a component
/// can never contain the separator.
fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(component: &str) -> Result<String, String> {
    let mut out = String::with_capacity(component.len());
    let mut rest = component;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3).unwrap_or_default();
        match code {
            "25" => out.push('%'),
            "3A" | "3a" => out.push(':'),
            _ => return Err(format!("invalid escape '%{code}' in '{component}'")),
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for CacheKey {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let Some((page, widget)) = raw.split_once(KEY_SEPARATOR) else {
            return Err(format!("cache key '{raw}' has no '{KEY_SEPARATOR}' separator"));
        };
        if widget.contains(':') {
            return Err(format!("cache key '{raw}' has an unescaped ':' in its widget"));
        }
        Ok(Self::new(unescape(page)?, unescape(widget)?))
    }
}
