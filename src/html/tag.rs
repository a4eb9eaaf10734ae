//! 标签模型
//!
//! 描述开始标签与结束标签，并负责将标签重新序列化为字符串。

use crate::html::error::{MarkupError, Result};
use std::fmt;

/// 标签类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// 开始标签 `<name ...>`
    Start,
    /// 结束标签 `</name>`
    End,
}

/// 标签属性，`value` 为 `None` 表示布尔属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    /// 创建带值的属性
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// 创建布尔属性
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// 一个开始或结束标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupTag {
    pub kind: TagKind,
    pub name: String,
    pub attrs: Vec<Attribute>,
    /// 是否以 `/>` 结尾
    pub is_self_end: bool,
    /// 是否按XHTML规则序列化
    pub is_xhtml: bool,
    /// 是否位于SVG/MathML外部内容中，属性名区分大小写
    pub is_foreign: bool,
}

impl MarkupTag {
    /// 创建开始标签
    pub fn start(name: impl Into<String>, attrs: Vec<Attribute>, is_xhtml: bool) -> Self {
        Self {
            kind: TagKind::Start,
            name: name.into(),
            attrs,
            is_self_end: false,
            is_xhtml,
            is_foreign: false,
        }
    }

    /// 创建结束标签
    pub fn end(name: impl Into<String>, is_xhtml: bool) -> Self {
        Self {
            kind: TagKind::End,
            name: name.into(),
            attrs: Vec::new(),
            is_self_end: false,
            is_xhtml,
            is_foreign: false,
        }
    }

    pub fn is_start(&self) -> bool {
        self.kind == TagKind::Start
    }

    pub fn is_end(&self) -> bool {
        self.kind == TagKind::End
    }

    /// 按名称查找属性（HTML模式下外部内容以外忽略大小写）
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| self.name_matches(&a.name, name))
    }

    /// 获取属性值，布尔属性或不存在时返回 `None`
    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(|a| a.value.as_deref())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// 属性是否存在且为布尔属性
    pub fn is_bool_attr(&self, name: &str) -> bool {
        self.attr(name).is_some_and(|a| a.value.is_none())
    }

    /// 设置属性值
    ///
    /// 已存在的同名属性被就地替换，否则追加到属性列表末尾。
    ///
    /// # 参数
    /// * `name` - 属性名
    /// * `value` - 属性值，`None` 表示布尔属性
    ///
    /// # 返回值
    /// * `Result<()>` - 属性名无效时返回 `MarkupError::InvalidAttributeName`
    pub fn set_attr(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        if !is_valid_attr_name(name) {
            return Err(MarkupError::InvalidAttributeName(name.to_string()));
        }

        let value = value.map(str::to_string);
        let case_sensitive = self.is_case_sensitive();
        match self
            .attrs
            .iter_mut()
            .find(|a| names_equal(case_sensitive, &a.name, name))
        {
            Some(existing) => existing.value = value,
            None => self.attrs.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
        Ok(())
    }

    /// 移除所有同名属性，返回是否有属性被移除
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        let case_sensitive = self.is_case_sensitive();
        self.attrs.retain(|a| !names_equal(case_sensitive, &a.name, name));
        self.attrs.len() != before
    }

    fn is_case_sensitive(&self) -> bool {
        self.is_xhtml || self.is_foreign
    }

    fn name_matches(&self, attr_name: &str, wanted: &str) -> bool {
        names_equal(self.is_case_sensitive(), attr_name, wanted)
    }
}

impl fmt::Display for MarkupTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_end() {
            return write!(f, "</{}>", self.name);
        }

        write!(f, "<{}", self.name)?;
        for attr in &self.attrs {
            match &attr.value {
                Some(value) => write!(f, " {}=\"{}\"", attr.name, escape_attr(value))?,
                None if self.is_xhtml => write!(f, " {0}=\"{0}\"", attr.name)?,
                None => write!(f, " {}", attr.name)?,
            }
        }
        if self.is_self_end {
            write!(f, " />")
        } else {
            write!(f, ">")
        }
    }
}

/// 转义属性值中的 `&`、`<`、`>` 和 `"`
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn names_equal(case_sensitive: bool, a: &str, b: &str) -> bool {
    if case_sensitive { a == b } else { a.eq_ignore_ascii_case(b) }
}

fn is_valid_attr_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            !c.is_whitespace() && !c.is_control() && !matches!(c, '"' | '\'' | '>' | '/' | '=' | '<')
        })
}
