//! 标记单元
//!
//! 分词器输出的最小单位。每个单元保存解析时消耗的原始文本（`src`），
//! 在原始文本存在时按原样输出，否则按内容重新序列化。

use crate::html::tag::{MarkupTag, TagKind};
use std::fmt;

/// 标记单元的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind {
    StartTag,
    EndTag,
    Text,
    Comment,
    Declaration,
    Cdata,
    ProcessingInstruction,
}

/// 标记单元的内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupContent {
    /// 开始或结束标签
    Tag(MarkupTag),
    /// 原样文本（不解码字符引用）
    Text(String),
    /// 注释内容，不含 `<!--` 与 `-->`
    Comment(String),
    /// `<!DOCTYPE ...>` 中 `<!` 与 `>` 之间的内容
    Declaration(String),
    /// `<![CDATA[...]]>` 与 `<![if ...]>` 这类标记段
    ///
    /// `data` 为 `<![` 与结束符之间的内容，`closing` 为 `]]>` 或 `]>`。
    MarkedSection {
        data: String,
        closing: String,
        is_xhtml: bool,
    },
    /// 处理指令中 `<?` 与 `>` 之间的内容
    ProcessingInstruction(String),
}

/// 分词器产生的一个标记单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup {
    pub content: MarkupContent,
    /// 解析时消耗的原始文本，隐含单元为 `None`
    pub src: Option<String>,
    /// 是否为补全的隐含单元（例如空元素的结束标签）
    pub hidden: bool,
}

impl Markup {
    /// 创建带原始文本的标记单元
    pub fn new(content: MarkupContent, src: impl Into<String>) -> Self {
        Self {
            content,
            src: Some(src.into()),
            hidden: false,
        }
    }

    /// 创建隐含单元
    pub fn hidden(content: MarkupContent) -> Self {
        Self {
            content,
            src: None,
            hidden: true,
        }
    }

    pub fn kind(&self) -> MarkupKind {
        match &self.content {
            MarkupContent::Tag(tag) => match tag.kind {
                TagKind::Start => MarkupKind::StartTag,
                TagKind::End => MarkupKind::EndTag,
            },
            MarkupContent::Text(_) => MarkupKind::Text,
            MarkupContent::Comment(_) => MarkupKind::Comment,
            MarkupContent::Declaration(_) => MarkupKind::Declaration,
            MarkupContent::MarkedSection { .. } => MarkupKind::Cdata,
            MarkupContent::ProcessingInstruction(_) => MarkupKind::ProcessingInstruction,
        }
    }

    pub fn tag(&self) -> Option<&MarkupTag> {
        match &self.content {
            MarkupContent::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    /// 获取可修改的标签
    ///
    /// 修改后原始文本不再可信，因此会同时清除 `src`。
    pub fn tag_mut(&mut self) -> Option<&mut MarkupTag> {
        match &mut self.content {
            MarkupContent::Tag(tag) => {
                self.src = None;
                Some(tag)
            }
            _ => None,
        }
    }

    /// 是否为指定名称的开始标签（忽略大小写）
    pub fn is_start_tag(&self, name: &str) -> bool {
        self.tag()
            .is_some_and(|t| t.is_start() && t.name.eq_ignore_ascii_case(name))
    }

    /// 是否为指定名称的结束标签（忽略大小写）
    pub fn is_end_tag(&self, name: &str) -> bool {
        self.tag()
            .is_some_and(|t| t.is_end() && t.name.eq_ignore_ascii_case(name))
    }

    /// 原始文本，清除后返回 `None`
    pub fn to_original(&self) -> Option<&str> {
        self.src.as_deref()
    }

    /// 清除原始文本，之后输出将按内容重新序列化
    pub fn clear_src(&mut self) {
        self.src = None;
    }

    /// 按内容重新序列化，忽略原始文本
    pub fn render(&self) -> String {
        match &self.content {
            MarkupContent::Tag(tag) => tag.to_string(),
            MarkupContent::Text(data) => data.clone(),
            MarkupContent::Comment(data) => format!("<!--{}-->", data),
            MarkupContent::Declaration(data) => format!("<!{}>", data),
            MarkupContent::MarkedSection {
                data,
                closing,
                is_xhtml,
            } => {
                if *is_xhtml {
                    format!("<![{}{}", data, closing)
                } else {
                    format!("<!{}>", data)
                }
            }
            MarkupContent::ProcessingInstruction(data) => format!("<?{}>", data),
        }
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.src {
            Some(src) => f.write_str(src),
            None => f.write_str(&self.render()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::tag::Attribute;

    #[test]
    fn test_display_prefers_src() {
        let tag = MarkupTag::start("SPAN", vec![Attribute::new("TITLE", "t")], false);
        let mut markup = Markup::new(MarkupContent::Tag(tag), "<SPAN TITLE=t>");
        assert_eq!(markup.to_string(), "<SPAN TITLE=t>");
        assert_eq!(markup.to_original(), Some("<SPAN TITLE=t>"));

        markup.clear_src();
        assert_eq!(markup.to_string(), r#"<SPAN TITLE="t">"#);
        assert_eq!(markup.to_original(), None);
    }

    #[test]
    fn test_tag_mut_clears_src() {
        let tag = MarkupTag::start("a", vec![Attribute::new("href", "x")], false);
        let mut markup = Markup::new(MarkupContent::Tag(tag), "<a href=x>");
        markup
            .tag_mut()
            .unwrap()
            .set_attr("href", Some("y"))
            .unwrap();
        assert_eq!(markup.to_string(), r#"<a href="y">"#);
    }

    #[test]
    fn test_render_non_tag_content() {
        let comment = Markup::new(MarkupContent::Comment(" c ".into()), "<!-- c -->");
        assert_eq!(comment.render(), "<!-- c -->");
        assert_eq!(comment.kind(), MarkupKind::Comment);

        let pi = Markup::new(
            MarkupContent::ProcessingInstruction("xml version=\"1.0\"?".into()),
            "<?xml version=\"1.0\"?>",
        );
        assert_eq!(pi.render(), "<?xml version=\"1.0\"?>");

        let section = MarkupContent::MarkedSection {
            data: "CDATA[x<y".into(),
            closing: "]]>".into(),
            is_xhtml: false,
        };
        let html = Markup::new(section, "<![CDATA[x<y]]>");
        assert_eq!(html.render(), "<!CDATA[x<y>");
        assert_eq!(html.kind(), MarkupKind::Cdata);

        let section = MarkupContent::MarkedSection {
            data: "CDATA[x<y".into(),
            closing: "]]>".into(),
            is_xhtml: true,
        };
        let xhtml = Markup::new(section, "<![CDATA[x<y]]>");
        assert_eq!(xhtml.render(), "<![CDATA[x<y]]>");
    }

    #[test]
    fn test_hidden_markup() {
        let markup = Markup::hidden(MarkupContent::Tag(MarkupTag::end("br", false)));
        assert!(markup.hidden);
        assert!(markup.is_end_tag("BR"));
        assert_eq!(markup.to_string(), "</br>");
    }
}
