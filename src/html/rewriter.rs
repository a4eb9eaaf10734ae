//! HTML/XHTML分词重写器
//!
//! 把标记文本切分为可逆的标记单元序列。只做词法层面的切分，不构建
//! 文档树；唯一的结构推断是补全空元素与外部内容（SVG/MathML）中未闭合
//! 元素的结束标签，这些补全单元标记为 `hidden`。

use crate::html::entities::unescape;
use crate::html::error::Result;
use crate::html::markup::{Markup, MarkupContent};
use crate::html::tag::{Attribute, MarkupTag};
use std::io::{Read, Write};

/// HTML空元素
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// 内容按原始文本处理的元素
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes",
];

/// 外部内容中仍按原始文本处理的元素
const FOREIGN_RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// 外部内容的根元素
const FOREIGN_ROOTS: &[&str] = &["svg", "math"];

/// 以 `]]>` 结束的标记段关键字
const SECTION_KEYWORDS: &[&str] = &["cdata", "temp", "ignore", "include", "rcdata"];

/// 以 `]>` 结束的条件段关键字
const CONDITIONAL_KEYWORDS: &[&str] = &["if", "else", "endif"];

/// HTML/XHTML分词重写器
///
/// # 示例
///
/// ```rust
/// use scrapforge::html::HtmlRewriter;
///
/// let rewriter = HtmlRewriter::new(false);
/// let mut markups = rewriter.loads("<P CLASS=a>text<br>");
/// assert_eq!(rewriter.dumps(&markups), "<P CLASS=a>text<br></br>");
///
/// for m in markups.iter_mut() {
///     m.clear_src();
/// }
/// assert_eq!(rewriter.dumps(&markups), r#"<p class="a">text<br></br>"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRewriter {
    pub is_xhtml: bool,
}

impl HtmlRewriter {
    /// 创建分词重写器
    ///
    /// # 参数
    /// * `is_xhtml` - 是否按XHTML规则处理（保留大小写，不推断空元素）
    pub fn new(is_xhtml: bool) -> Self {
        Self { is_xhtml }
    }

    /// 把标记文本切分为标记单元序列，不会失败
    ///
    /// # 参数
    /// * `text` - HTML或XHTML文本
    ///
    /// # 返回值
    /// * `Vec<Markup>` - 标记单元序列，序列结束即文档结束
    pub fn loads(&self, text: &str) -> Vec<Markup> {
        Tokenizer::new(text, self.is_xhtml).run()
    }

    /// 从读取器加载并切分标记文本
    pub fn load<R: Read>(&self, mut reader: R) -> Result<Vec<Markup>> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(self.loads(&text))
    }

    /// 把标记单元序列拼接为字符串
    pub fn dumps(&self, markups: &[Markup]) -> String {
        markups.iter().map(|m| m.to_string()).collect()
    }

    /// 把标记单元序列写入写入器
    pub fn dump<W: Write>(&self, markups: &[Markup], mut writer: W) -> Result<()> {
        for markup in markups {
            write!(writer, "{}", markup)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// 扫描状态
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    /// 普通数据
    Data,
    /// 原始文本元素的内容，直到匹配的结束标签
    RawText { element: String },
}

/// 元素上下文
#[derive(Debug, Clone, PartialEq, Eq)]
enum Context {
    Html,
    /// 外部内容子树，`open` 为尚未闭合的元素名（栈底为根元素）
    Foreign { open: Vec<String> },
}

/// 标签的词法解析结果
struct RawTag {
    name: String,
    attrs: Vec<Attribute>,
    self_closing: bool,
    consumed: usize,
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    is_xhtml: bool,
    state: ScanState,
    context: Context,
    out: Vec<Markup>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str, is_xhtml: bool) -> Self {
        Self {
            input,
            pos: 0,
            is_xhtml,
            state: ScanState::Data,
            context: Context::Html,
            out: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Markup> {
        while self.pos < self.input.len() {
            match self.state.clone() {
                ScanState::Data => self.scan_data(),
                ScanState::RawText { element } => self.scan_raw_text(&element),
            }
        }
        self.out
    }

    fn scan_data(&mut self) {
        let input = self.input;
        let rest = &input[self.pos..];
        if is_markup_start(rest) {
            self.pos += self.scan_markup(rest);
            return;
        }

        let end = rest
            .match_indices('<')
            .map(|(i, _)| i)
            .find(|&i| i > 0 && is_markup_start(&rest[i..]))
            .unwrap_or(rest.len());
        self.push_text(&rest[..end]);
        self.pos += end;
    }

    fn scan_raw_text(&mut self, element: &str) {
        let input = self.input;
        let rest = &input[self.pos..];
        let end = find_raw_text_end(rest, element).unwrap_or(rest.len());
        if end > 0 {
            self.push_text(&rest[..end]);
        }
        self.pos += end;
        self.state = ScanState::Data;
    }

    /// 解析以 `<` 开头的标记，返回消耗的字节数
    fn scan_markup(&mut self, rest: &str) -> usize {
        if rest.starts_with("<!--") {
            self.scan_comment(rest)
        } else if rest.starts_with("<![") {
            self.scan_marked_section(rest)
        } else if rest.starts_with("<!") {
            if starts_with_ignore_case(&rest[2..], "doctype") {
                self.scan_declaration(rest)
            } else {
                self.scan_bogus_comment(rest, 2)
            }
        } else if let Some(body) = rest.strip_prefix("<?") {
            let (data, consumed) = until_gt(body);
            self.out.push(Markup::new(
                MarkupContent::ProcessingInstruction(data.to_string()),
                &rest[..2 + consumed],
            ));
            2 + consumed
        } else if rest.starts_with("</") {
            if rest[2..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                self.scan_end_tag(rest)
            } else {
                self.scan_bogus_comment(rest, 2)
            }
        } else {
            self.scan_start_tag(rest)
        }
    }

    fn scan_comment(&mut self, rest: &str) -> usize {
        let body = &rest[4..];
        let (data, consumed) = if body.starts_with('>') {
            ("", 5)
        } else if body.starts_with("->") {
            ("", 6)
        } else {
            match body.find("-->") {
                Some(end) => (&body[..end], 4 + end + 3),
                None => (body, rest.len()),
            }
        };
        self.out.push(Markup::new(
            MarkupContent::Comment(data.to_string()),
            &rest[..consumed],
        ));
        consumed
    }

    fn scan_bogus_comment(&mut self, rest: &str, offset: usize) -> usize {
        let (data, consumed) = until_gt(&rest[offset..]);
        self.out.push(Markup::new(
            MarkupContent::Comment(data.to_string()),
            &rest[..offset + consumed],
        ));
        offset + consumed
    }

    fn scan_marked_section(&mut self, rest: &str) -> usize {
        let body = &rest[3..];
        let keyword_len = body
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(body.len());
        let keyword = body[..keyword_len].to_ascii_lowercase();

        let closing = if SECTION_KEYWORDS.contains(&keyword.as_str()) {
            "]]>"
        } else if CONDITIONAL_KEYWORDS.contains(&keyword.as_str()) {
            "]>"
        } else {
            return self.scan_bogus_comment(rest, 2);
        };

        let (data, consumed) = match body.find(closing) {
            Some(end) => (&body[..end], 3 + end + closing.len()),
            None => (body, rest.len()),
        };
        self.out.push(Markup::new(
            MarkupContent::MarkedSection {
                data: data.to_string(),
                closing: closing.to_string(),
                is_xhtml: self.is_xhtml,
            },
            &rest[..consumed],
        ));
        consumed
    }

    fn scan_declaration(&mut self, rest: &str) -> usize {
        let bytes = rest.as_bytes();
        let mut quote: Option<u8> = None;
        let mut depth = 0usize;
        let mut end = None;

        for (i, &b) in bytes.iter().enumerate().skip(2) {
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None => match b {
                    b'"' | b'\'' => quote = Some(b),
                    b'[' => depth += 1,
                    b']' => depth = depth.saturating_sub(1),
                    b'>' if depth == 0 => {
                        end = Some(i);
                        break;
                    }
                    _ => {}
                },
            }
        }

        let (data, consumed) = match end {
            Some(i) => (&rest[2..i], i + 1),
            None => (&rest[2..], rest.len()),
        };
        self.out.push(Markup::new(
            MarkupContent::Declaration(data.to_string()),
            &rest[..consumed],
        ));
        consumed
    }

    fn scan_start_tag(&mut self, rest: &str) -> usize {
        let raw = parse_tag(rest, 1);
        let src = &rest[..raw.consumed];
        let lname = raw.name.to_ascii_lowercase();
        let in_foreign = matches!(self.context, Context::Foreign { .. });
        let enters_foreign = !in_foreign && FOREIGN_ROOTS.contains(&lname.as_str());

        let name = if self.is_xhtml || in_foreign {
            raw.name
        } else {
            lname.clone()
        };
        let attrs = if self.is_xhtml || in_foreign || enters_foreign {
            raw.attrs
        } else {
            normalize_html_attrs(raw.attrs)
        };

        let mut tag = MarkupTag::start(name.clone(), attrs, self.is_xhtml);
        tag.is_self_end = raw.self_closing;
        tag.is_foreign = in_foreign || enters_foreign;
        self.out.push(Markup::new(MarkupContent::Tag(tag), src));

        if in_foreign {
            if let Context::Foreign { open } = &mut self.context {
                if !raw.self_closing {
                    open.push(name);
                }
            }
        } else if enters_foreign {
            if !raw.self_closing {
                self.context = Context::Foreign { open: vec![name] };
            }
        } else if !self.is_xhtml && VOID_ELEMENTS.contains(&lname.as_str()) {
            self.push_hidden_end(name);
        }

        let raw_text_elements = if in_foreign {
            FOREIGN_RAW_TEXT_ELEMENTS
        } else {
            RAW_TEXT_ELEMENTS
        };
        if !raw.self_closing && raw_text_elements.contains(&lname.as_str()) {
            self.state = ScanState::RawText { element: lname };
        }

        raw.consumed
    }

    fn scan_end_tag(&mut self, rest: &str) -> usize {
        let raw = parse_tag(rest, 2);
        let src = &rest[..raw.consumed];

        let mut pending = Vec::new();
        let mut leaves_foreign = false;
        let name = if let Context::Foreign { open } = &mut self.context {
            if let Some(idx) = open
                .iter()
                .rposition(|n| n.eq_ignore_ascii_case(&raw.name))
            {
                pending.extend(open.drain(idx + 1..).rev());
                open.truncate(idx);
                leaves_foreign = open.is_empty();
            }
            raw.name
        } else if self.is_xhtml {
            raw.name
        } else {
            let name = raw.name.to_ascii_lowercase();
            if VOID_ELEMENTS.contains(&name.as_str()) {
                self.drop_hidden_end(&name);
            }
            name
        };

        if leaves_foreign {
            self.context = Context::Html;
        }
        for unclosed in pending {
            self.push_hidden_end(unclosed);
        }
        let tag = MarkupTag::end(name, self.is_xhtml);
        self.out.push(Markup::new(MarkupContent::Tag(tag), src));
        raw.consumed
    }

    fn push_text(&mut self, text: &str) {
        self.out
            .push(Markup::new(MarkupContent::Text(text.to_string()), text));
    }

    fn push_hidden_end(&mut self, name: String) {
        let tag = MarkupTag::end(name, self.is_xhtml);
        self.out.push(Markup::hidden(MarkupContent::Tag(tag)));
    }

    /// 显式的空元素结束标签紧跟在补全的结束标签之后时，由显式标签取代补全标签
    fn drop_hidden_end(&mut self, name: &str) {
        if self
            .out
            .last()
            .is_some_and(|m| m.hidden && m.is_end_tag(name))
        {
            self.out.pop();
        }
    }
}

/// 判断 `<` 是否开始一个标记
fn is_markup_start(s: &str) -> bool {
    let mut chars = s.chars();
    if chars.next() != Some('<') {
        return false;
    }
    match chars.next() {
        Some('!') | Some('?') => true,
        Some('/') => !matches!(chars.next(), None | Some('>')),
        Some(c) => c.is_ascii_alphabetic(),
        None => false,
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}

/// 返回 `>` 之前的内容以及包含 `>` 的长度；没有 `>` 时取到末尾
fn until_gt(s: &str) -> (&str, usize) {
    match s.find('>') {
        Some(end) => (&s[..end], end + 1),
        None => (s, s.len()),
    }
}

/// 查找原始文本元素的结束标签位置
fn find_raw_text_end(rest: &str, element: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    rest.match_indices("</").map(|(i, _)| i).find(|&i| {
        let name_start = i + 2;
        let name_end = name_start + element.len();
        let name_matches = bytes
            .get(name_start..name_end)
            .is_some_and(|n| n.eq_ignore_ascii_case(element.as_bytes()));
        name_matches
            && bytes
                .get(name_end)
                .is_none_or(|&b| is_space(b) || b == b'/' || b == b'>')
    })
}

/// 词法解析一个标签
///
/// `start` 为标签名的起始偏移（开始标签为1，结束标签为2）。
fn parse_tag(s: &str, start: usize) -> RawTag {
    let bytes = s.as_bytes();
    let len = bytes.len();

    let mut i = start;
    while i < len && !is_space(bytes[i]) && bytes[i] != b'/' && bytes[i] != b'>' {
        i += 1;
    }
    let name = s[start..i].to_string();

    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        while i < len && is_space(bytes[i]) {
            i += 1;
        }
        if i >= len {
            break;
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                self_closing = true;
                i += 2;
                break;
            }
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        // 属性名至少包含一个字符，首字符可以是 `=`
        let name_start = i;
        i += 1;
        while i < len && !is_space(bytes[i]) && !matches!(bytes[i], b'/' | b'>' | b'=') {
            i += 1;
        }
        let attr_name = s[name_start..i].to_string();

        let mut j = i;
        while j < len && is_space(bytes[j]) {
            j += 1;
        }
        if j >= len || bytes[j] != b'=' {
            attrs.push(Attribute::boolean(attr_name));
            continue;
        }

        i = j + 1;
        while i < len && is_space(bytes[i]) {
            i += 1;
        }
        let value = match bytes.get(i) {
            Some(&q) if q == b'"' || q == b'\'' => {
                let value_start = i + 1;
                match s[value_start..].find(q as char) {
                    Some(end) => {
                        i = value_start + end + 1;
                        &s[value_start..value_start + end]
                    }
                    None => {
                        i = len;
                        &s[value_start..]
                    }
                }
            }
            _ => {
                let value_start = i;
                while i < len && !is_space(bytes[i]) && bytes[i] != b'>' {
                    i += 1;
                }
                &s[value_start..i]
            }
        };
        attrs.push(Attribute::new(attr_name, unescape(value)));
    }

    RawTag {
        name,
        attrs,
        self_closing,
        consumed: i.min(len),
    }
}

/// HTML模式：属性名转小写，重复属性只保留第一个
fn normalize_html_attrs(attrs: Vec<Attribute>) -> Vec<Attribute> {
    let mut result: Vec<Attribute> = Vec::with_capacity(attrs.len());
    for mut attr in attrs {
        attr.name = attr.name.to_ascii_lowercase();
        if !result.iter().any(|a| a.name == attr.name) {
            result.push(attr);
        }
    }
    result
}
